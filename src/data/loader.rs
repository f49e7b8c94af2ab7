// ============================================================
// Layer 4 — CSV Dataset Loader
// ============================================================
// Reads one or more CSV files into transit records and
// concatenates them.
//
// Sources come in several shapes:
//   - the canonical layout (orbital_period, ..., label)
//   - Kepler KOI exports   (koi_period, koi_duration, ...)
//   - TESS TOI exports     (pl_orbper, pl_trandurh, ...)
//   - K2 candidate exports (pl_orbper, pl_trandur, ...)
// Each canonical column has a list of accepted header names;
// the first one present in a file wins.
//
// NASA archive downloads start with '#' comment lines, which
// the csv reader skips.
//
// Row handling:
//   - label, orbital period, duration or radius missing → row dropped
//   - stellar_temp missing                              → kept as None
//   - label normalised to trimmed upper case, with TFOPWG
//     codes mapped onto the Kepler disposition names

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::domain::error::ValidationError;
use crate::domain::record::{RawDataset, TransitRecord, FEATURES, TARGET};
use crate::domain::traits::DatasetSource;

const ORBITAL_PERIOD_ALIASES:   &[&str] = &["orbital_period", "koi_period", "pl_orbper"];
const TRANSIT_DURATION_ALIASES: &[&str] = &["transit_duration", "koi_duration", "pl_trandurh", "pl_trandur"];
const PLANET_RADIUS_ALIASES:    &[&str] = &["planet_radius", "koi_prad", "pl_rade"];
const STELLAR_TEMP_ALIASES:     &[&str] = &["stellar_temp", "koi_steff", "st_teff"];
const LABEL_ALIASES:            &[&str] = &["label", "koi_disposition", "tfopwg_disp", "disposition"];

/// Loads and concatenates CSV files.
/// Implements the DatasetSource trait from Layer 3.
pub struct CsvDatasetLoader {
    paths: Vec<PathBuf>,
}

impl CsvDatasetLoader {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl DatasetSource for CsvDatasetLoader {
    fn load_all(&self) -> Result<RawDataset> {
        let mut merged = RawDataset::default();
        for path in &self.paths {
            let part = load_single_csv(path)?;
            tracing::info!("Loaded {} rows from '{}'", part.len(), path.display());
            merged.merge(part);
        }
        if merged.is_empty() {
            let names: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
            return Err(ValidationError::NoUsableRows { source_name: names.join(", ") }.into());
        }
        tracing::info!("Merged dataset: {} rows from {} source(s)", merged.len(), self.paths.len());
        Ok(merged)
    }
}

/// Column positions resolved from one file's header row.
struct ColumnMap {
    orbital_period:   usize,
    transit_duration: usize,
    planet_radius:    usize,
    stellar_temp:     Option<usize>,
    label:            usize,
}

impl ColumnMap {
    fn resolve(headers: &csv::StringRecord, source: &Path) -> Result<Self, ValidationError> {
        let find = |aliases: &[&str]| {
            aliases.iter().find_map(|alias| {
                headers.iter().position(|h| h.trim().eq_ignore_ascii_case(alias))
            })
        };
        let require = |aliases: &[&str], column: &str| {
            find(aliases).ok_or_else(|| ValidationError::MissingColumn {
                source_name: source.display().to_string(),
                column:      column.to_string(),
            })
        };

        Ok(Self {
            orbital_period:   require(ORBITAL_PERIOD_ALIASES, FEATURES[0])?,
            transit_duration: require(TRANSIT_DURATION_ALIASES, FEATURES[1])?,
            planet_radius:    require(PLANET_RADIUS_ALIASES, FEATURES[2])?,
            stellar_temp:     find(STELLAR_TEMP_ALIASES),
            label:            require(LABEL_ALIASES, TARGET)?,
        })
    }

    fn parse(&self, row: &csv::StringRecord) -> Option<TransitRecord> {
        let number = |idx: usize| row.get(idx).and_then(parse_number);
        let label  = row.get(self.label).and_then(normalise_label)?;
        Some(TransitRecord::new(
            number(self.orbital_period)?,
            number(self.transit_duration)?,
            number(self.planet_radius)?,
            self.stellar_temp.and_then(number),
            label,
        ))
    }
}

/// Parse one CSV file.
fn load_single_csv(path: &Path) -> Result<RawDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Cannot open dataset '{}'", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Cannot read header row of '{}'", path.display()))?
        .clone();
    let columns = ColumnMap::resolve(&headers, path)?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for (line, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Malformed row {} in '{}'", line + 1, path.display()))?;
        match columns.parse(&row) {
            Some(record) => records.push(record),
            None         => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(
            "Dropped {} row(s) from '{}' with a missing label or required feature",
            dropped,
            path.display()
        );
    }
    if records.is_empty() {
        tracing::warn!("'{}' contributed no usable rows", path.display());
    }

    Ok(RawDataset::new(records, columns.stellar_temp.is_some()))
}

/// A finite number, or None for blanks and junk.
fn parse_number(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Trim and upper-case a label; map TESS TFOPWG codes onto the
/// Kepler disposition vocabulary. Blank labels are None.
fn normalise_label(field: &str) -> Option<String> {
    let label = field.trim().to_ascii_uppercase();
    if label.is_empty() {
        return None;
    }
    let mapped = match label.as_str() {
        "CP" | "KP"  => "CONFIRMED",
        "PC" | "APC" => "CANDIDATE",
        "FP" | "FA"  => "FALSE POSITIVE",
        other        => other,
    };
    Some(mapped.to_string())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_loads_canonical_columns() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "sample.csv",
            "orbital_period,transit_duration,planet_radius,stellar_temp,label\n\
             3.5,2.1,1.2,5600,CONFIRMED\n\
             10.0,4.0,2.5,,false positive\n");
        let ds = CsvDatasetLoader::new(vec![path]).load_all().unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.has_stellar_temp);
        assert_eq!(ds.records[1].stellar_temp, None);
        assert_eq!(ds.records[1].label, "FALSE POSITIVE");
    }

    #[test]
    fn test_koi_export_with_comments() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "koi.csv",
            "# This file was produced by the NASA Exoplanet Archive\n\
             # COLUMN koi_period: Orbital Period [days]\n\
             kepid,koi_disposition,koi_pdisposition,koi_period,koi_duration,koi_prad,koi_steff\n\
             1,CONFIRMED,CANDIDATE,9.48,2.95,2.26,5455\n\
             2,FALSE POSITIVE,FALSE POSITIVE,1.73,2.40,,5805\n\
             3,CANDIDATE,CANDIDATE,19.89,1.78,14.6,6031\n");
        let ds = CsvDatasetLoader::new(vec![path]).load_all().unwrap();
        // Row 2 has no planet radius and is dropped.
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].label, "CONFIRMED");
        assert_eq!(ds.records[1].orbital_period, 19.89);
        assert_eq!(ds.records[1].stellar_temp, Some(6031.0));
    }

    #[test]
    fn test_toi_codes_are_normalised() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "toi.csv",
            "tfopwg_disp,pl_orbper,pl_trandurh,pl_rade,st_teff\n\
             PC,2.1,1.5,3.3,5100\n\
             KP,4.2,2.5,11.0,6100\n\
             FA,1.1,0.9,1.0,4100\n");
        let ds = CsvDatasetLoader::new(vec![path]).load_all().unwrap();
        let labels: Vec<_> = ds.records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["CANDIDATE", "CONFIRMED", "FALSE POSITIVE"]);
    }

    #[test]
    fn test_sources_are_concatenated() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.csv",
            "orbital_period,transit_duration,planet_radius,label\n1,2,3,A\n");
        let b = write(&dir, "b.csv",
            "orbital_period,transit_duration,planet_radius,stellar_temp,label\n4,5,6,5000,B\n");
        let ds = CsvDatasetLoader::new(vec![a, b]).load_all().unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.has_stellar_temp);
        assert_eq!(ds.records[0].stellar_temp, None);
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.csv", "orbital_period,planet_radius,label\n1,2,A\n");
        let err  = CsvDatasetLoader::new(vec![path]).load_all().unwrap_err();
        let err  = err.downcast_ref::<ValidationError>().unwrap();
        assert!(matches!(err, ValidationError::MissingColumn { column, .. } if column == "transit_duration"));
    }

    #[test]
    fn test_all_rows_dropped_is_an_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(&dir, "empty.csv",
            "orbital_period,transit_duration,planet_radius,label\n1,2,,A\n,2,3,B\n");
        let err  = CsvDatasetLoader::new(vec![path]).load_all().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::NoUsableRows { .. })
        ));
    }

    #[test]
    fn test_parse_number_rejects_junk() {
        assert_eq!(parse_number(" 4.5 "), Some(4.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("abc"), None);
    }
}
