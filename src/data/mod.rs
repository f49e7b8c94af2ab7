// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between "some CSV files on disk" and "a feature
// matrix split into train and test sets".
//
//   NASA Exoplanet Archive / local CSV files
//       │
//       ▼
//   acquisition       → decides which files to read (downloads defaults)
//       │
//       ▼
//   CsvDatasetLoader  → resolves column aliases, parses rows
//       │
//       ▼
//   Preprocessor      → imputes stellar_temp, validates size/classes
//       │
//       ▼
//   LabelEncoder      → label strings ⇄ contiguous integer codes
//       │
//       ▼
//   splitter          → size-adaptive, optionally stratified split
//
// Each module does exactly one step and is tested on its own.

/// Locates local datasets and fetches the defaults when missing
pub mod acquisition;

/// Reads CSV exports into transit records
pub mod loader;

/// Imputation and validation of the merged records
pub mod preprocessor;

/// The prepared feature matrix and label vector
pub mod dataset;

/// Bidirectional label ⇄ code mapping
pub mod encoder;

/// Train/test split strategy and execution
pub mod splitter;
