// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the models directory.
//
//   artifact_store.rs — per-model JSON artifacts, BEST.txt and
//                       train_config.json
//   metrics.rs        — accuracy, classification reports and
//                       metrics.csv

/// Saves and loads artifacts, the best-model marker and the run config
pub mod artifact_store;

/// Evaluation metrics and the CSV metrics log
pub mod metrics;
