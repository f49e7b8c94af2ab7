// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the system
// talks about: transit records, the feature schema, typed
// validation errors and the abstractions other layers implement.
//
// Rules for this layer:
//   - NO burn or ndarray types
//   - NO file I/O or network calls
//   - Only plain structs, enums, traits and errors

// Transit records, the raw dataset and the feature schema
pub mod record;

// Typed errors callers and tests match on
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
