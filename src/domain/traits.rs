// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, so a
// CSV loader, an in-memory fixture or a future database reader
// are interchangeable.

use anyhow::Result;
use crate::domain::record::RawDataset;

// ─── DatasetSource ────────────────────────────────────────────────────────────
/// Any component that can produce transit records.
///
/// Implementations:
///   - CsvDatasetLoader → reads and concatenates CSV exports
pub trait DatasetSource {
    /// Load every record this source knows about.
    fn load_all(&self) -> Result<RawDataset>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// Any component whose state can be saved to and restored from disk.
///
/// Implementations:
///   - ModelArtifact → one fitted pipeline plus its metadata
pub trait Persistable: Sized {
    /// Save this component's state to the given path
    fn save(&self, path: &std::path::Path) -> Result<()>;

    /// Load a component's state from the given path.
    fn load(path: &std::path::Path) -> Result<Self>;
}
