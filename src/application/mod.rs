// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training the models or classifying one
// observation).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing (that's Layer 1)
//   - No direct file access (that's Layer 4 and 6)
//   - Only workflow coordination and progress lines
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow
pub mod train_use_case;

// Single-observation prediction with a saved model
pub mod predict_use_case;
