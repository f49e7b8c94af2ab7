// ============================================================
// Layer 4 — Dataset Acquisition
// ============================================================
// Decides which CSV files a training run reads.
//
//   explicit sample path given → just that file (must exist)
//   otherwise                  → the default archive tables in
//                                the data directory, downloading
//                                any that are missing (unless
//                                running offline)
//
// Default tables come from the NASA Exoplanet Archive TAP
// service, selecting only the columns the loader understands:
//
//   kepler_koi.csv     ← cumulative (Kepler Objects of Interest)
//   tess_toi.csv       ← toi        (TESS Objects of Interest)
//   k2_candidates.csv  ← k2pandc    (K2 planets and candidates)
//
// The CLI also uses `locate_default_data` to prefer a large
// bundled export, then a small sample, before falling back here.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    time::Duration,
};

/// Large archive export shipped next to the project, preferred when present.
pub const LARGE_DATASET: &str = "cumulative_2025.09.20_14.12.59.csv";

/// Small offline sample, used when the large export is absent.
pub const SAMPLE_DATASET: &str = "data/sample/kepler_sample.csv";

const ARCHIVE_TAP_ENDPOINT: &str = "https://exoplanetarchive.ipac.caltech.edu/TAP/sync";

/// One archive table and the columns pulled from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveTable {
    pub file_name: &'static str,
    pub table:     &'static str,
    pub columns:   &'static str,
}

impl ArchiveTable {
    /// The ADQL query selecting this table's columns.
    pub fn query(&self) -> String {
        format!("select {} from {}", self.columns, self.table)
    }
}

pub const DEFAULT_TABLES: [ArchiveTable; 3] = [
    ArchiveTable {
        file_name: "kepler_koi.csv",
        table:     "cumulative",
        columns:   "koi_period,koi_duration,koi_prad,koi_steff,koi_disposition",
    },
    ArchiveTable {
        file_name: "tess_toi.csv",
        table:     "toi",
        columns:   "pl_orbper,pl_trandurh,pl_rade,st_teff,tfopwg_disp",
    },
    ArchiveTable {
        file_name: "k2_candidates.csv",
        table:     "k2pandc",
        columns:   "pl_orbper,pl_trandur,pl_rade,st_teff,disposition",
    },
];

/// Where default datasets live and whether we may download them.
#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub data_dir: PathBuf,
    pub offline:  bool,
}

/// Anything that can write an archive table to a local file.
pub trait TableFetcher {
    fn fetch(&self, table: &ArchiveTable, dest: &Path) -> Result<()>;
}

/// Downloads tables from the Exoplanet Archive TAP endpoint.
pub struct ArchiveClient {
    endpoint: String,
    timeout:  Duration,
}

impl ArchiveClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self { endpoint: endpoint.into(), timeout }
    }
}

impl Default for ArchiveClient {
    fn default() -> Self {
        Self::new(ARCHIVE_TAP_ENDPOINT, Duration::from_secs(120))
    }
}

impl TableFetcher for ArchiveClient {
    fn fetch(&self, table: &ArchiveTable, dest: &Path) -> Result<()> {
        tracing::info!("Downloading '{}' from {}", table.table, self.endpoint);
        let response = ureq::get(&self.endpoint)
            .query("query", &table.query())
            .query("format", "csv")
            .timeout(self.timeout)
            .call()
            .with_context(|| format!("Request for archive table '{}' failed", table.table))?;

        save_download(&mut response.into_reader(), dest)
            .with_context(|| format!("Download of '{}' was interrupted", table.table))
    }
}

/// Stream `body` into a `.part` file next to `dest` and rename it
/// once complete. A failed copy leaves no partial file behind.
fn save_download(body: &mut dyn Read, dest: &Path) -> Result<()> {
    let partial = dest.with_extension("csv.part");
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("Cannot create '{}'", partial.display()))?;
    if let Err(err) = io::copy(body, &mut file) {
        drop(file);
        let _ = fs::remove_file(&partial);
        return Err(err).with_context(|| format!("Cannot write '{}'", partial.display()));
    }
    fs::rename(&partial, dest)
        .with_context(|| format!("Cannot move download into '{}'", dest.display()))
}

/// Return the CSV paths a training run should read.
pub fn ensure_datasets(
    offline_sample: Option<&Path>,
    settings:       &AcquisitionSettings,
    fetcher:        &dyn TableFetcher,
) -> Result<Vec<PathBuf>> {
    if let Some(sample) = offline_sample {
        if !sample.is_file() {
            bail!("Offline sample '{}' does not exist", sample.display());
        }
        return Ok(vec![sample.to_path_buf()]);
    }

    fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("Cannot create data directory '{}'", settings.data_dir.display()))?;

    let mut paths = Vec::new();
    for table in &DEFAULT_TABLES {
        let path = settings.data_dir.join(table.file_name);
        if !path.is_file() {
            if settings.offline {
                tracing::warn!("'{}' is missing and downloads are disabled", path.display());
                continue;
            }
            if let Err(e) = fetcher.fetch(table, &path) {
                tracing::warn!("Could not fetch '{}': {:#}", table.table, e);
                continue;
            }
        }
        paths.push(path);
    }

    if paths.is_empty() {
        bail!(
            "No datasets available in '{}'; pass a CSV path or allow downloads",
            settings.data_dir.display()
        );
    }
    Ok(paths)
}

/// Prefer the large bundled export, then the small sample.
pub fn locate_default_data(base_dir: &Path) -> Option<PathBuf> {
    [LARGE_DATASET, SAMPLE_DATASET]
        .iter()
        .map(|rel| base_dir.join(rel))
        .find(|path| path.is_file())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Writes a tiny canonical CSV instead of hitting the network.
    struct FakeFetcher {
        fetched: RefCell<Vec<&'static str>>,
        fail:    bool,
    }

    impl FakeFetcher {
        fn new(fail: bool) -> Self {
            Self { fetched: RefCell::new(Vec::new()), fail }
        }
    }

    impl TableFetcher for FakeFetcher {
        fn fetch(&self, table: &ArchiveTable, dest: &Path) -> Result<()> {
            if self.fail {
                bail!("network down");
            }
            self.fetched.borrow_mut().push(table.table);
            fs::write(dest, "orbital_period,transit_duration,planet_radius,label\n1,2,3,A\n")?;
            Ok(())
        }
    }

    fn settings(dir: &tempfile::TempDir, offline: bool) -> AcquisitionSettings {
        AcquisitionSettings { data_dir: dir.path().join("raw"), offline }
    }

    #[test]
    fn test_explicit_sample_is_used_as_is() {
        let dir    = tempfile::tempdir().unwrap();
        let sample = dir.path().join("sample.csv");
        fs::write(&sample, "x").unwrap();
        let fetcher = FakeFetcher::new(false);
        let paths = ensure_datasets(Some(&sample), &settings(&dir, false), &fetcher).unwrap();
        assert_eq!(paths, vec![sample]);
        assert!(fetcher.fetched.borrow().is_empty());
    }

    #[test]
    fn test_missing_sample_is_an_error() {
        let dir     = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        let result  = ensure_datasets(Some(&missing), &settings(&dir, false), &FakeFetcher::new(false));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_defaults_are_downloaded() {
        let dir      = tempfile::tempdir().unwrap();
        let settings = settings(&dir, false);
        fs::create_dir_all(&settings.data_dir).unwrap();
        fs::write(settings.data_dir.join("tess_toi.csv"), "x").unwrap();

        let fetcher = FakeFetcher::new(false);
        let paths   = ensure_datasets(None, &settings, &fetcher).unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(*fetcher.fetched.borrow(), vec!["cumulative", "k2pandc"]);
    }

    #[test]
    fn test_offline_uses_only_existing_files() {
        let dir      = tempfile::tempdir().unwrap();
        let settings = settings(&dir, true);
        fs::create_dir_all(&settings.data_dir).unwrap();
        fs::write(settings.data_dir.join("kepler_koi.csv"), "x").unwrap();

        let paths = ensure_datasets(None, &settings, &FakeFetcher::new(false)).unwrap();
        assert_eq!(paths, vec![settings.data_dir.join("kepler_koi.csv")]);
    }

    #[test]
    fn test_nothing_available_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ensure_datasets(None, &settings(&dir, false), &FakeFetcher::new(true)).is_err());
        assert!(ensure_datasets(None, &settings(&dir, true), &FakeFetcher::new(false)).is_err());
    }

    #[test]
    fn test_large_export_preferred_over_sample() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locate_default_data(dir.path()), None);

        let sample = dir.path().join(SAMPLE_DATASET);
        fs::create_dir_all(sample.parent().unwrap()).unwrap();
        fs::write(&sample, "x").unwrap();
        assert_eq!(locate_default_data(dir.path()), Some(sample));

        let large = dir.path().join(LARGE_DATASET);
        fs::write(&large, "x").unwrap();
        assert_eq!(locate_default_data(dir.path()), Some(large));
    }

    #[test]
    fn test_query_selects_declared_columns() {
        assert_eq!(
            DEFAULT_TABLES[0].query(),
            "select koi_period,koi_duration,koi_prad,koi_steff,koi_disposition from cumulative"
        );
    }

    /// Yields a few bytes, then fails like a dropped connection.
    struct BrokenStream {
        sent: bool,
    }

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
            }
            self.sent = true;
            let head = b"orbital_period,";
            buf[..head.len()].copy_from_slice(head);
            Ok(head.len())
        }
    }

    #[test]
    fn test_interrupted_download_leaves_no_files() {
        let dir  = tempfile::tempdir().unwrap();
        let dest = dir.path().join("koi.csv");

        assert!(save_download(&mut BrokenStream { sent: false }, &dest).is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("csv.part").exists());
    }

    #[test]
    fn test_completed_download_is_renamed() {
        let dir  = tempfile::tempdir().unwrap();
        let dest = dir.path().join("koi.csv");

        save_download(&mut &b"orbital_period,label\n1,A\n"[..], &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "orbital_period,label\n1,A\n");
        assert!(!dest.with_extension("csv.part").exists());
    }
}
