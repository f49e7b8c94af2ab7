// ============================================================
// Layer 4 — Preprocessor
// ============================================================
// Turns merged transit records into a PreparedDataset.
//
// Steps (applied in order):
//   1. Impute stellar_temp
//        - some source had the column → missing values become
//          the median of the values that are present
//        - no source had it (or it is empty everywhere) → 0.0
//   2. Validate the dataset is trainable
//        - at least MIN_SAMPLES rows
//        - at least MIN_CLASSES distinct labels
//   3. Assemble the [n, 4] feature matrix in FEATURES order
//
// Validation happens here, before any split or fit, so a bad
// dataset aborts the run without touching the models directory.

use ndarray::Array2;

use crate::data::dataset::PreparedDataset;
use crate::domain::error::ValidationError;
use crate::domain::record::{RawDataset, FEATURES};

/// Smallest dataset that still leaves rows for both train and test.
pub const MIN_SAMPLES: usize = 4;

/// A classifier needs something to tell apart.
pub const MIN_CLASSES: usize = 2;

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Impute, validate and assemble the feature matrix.
    pub fn prepare(&self, raw: RawDataset) -> Result<PreparedDataset, ValidationError> {
        let fill = stellar_temp_fill(&raw);
        tracing::debug!("Imputing missing stellar_temp with {:.2}", fill);

        let n = raw.records.len();
        if n < MIN_SAMPLES {
            return Err(ValidationError::TooFewSamples { found: n, min: MIN_SAMPLES });
        }

        let mut classes: Vec<&str> = raw.records.iter().map(|r| r.label.as_str()).collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < MIN_CLASSES {
            return Err(ValidationError::TooFewClasses { found: classes.len() });
        }

        let mut features = Array2::<f64>::zeros((n, FEATURES.len()));
        let mut labels   = Vec::with_capacity(n);
        for (i, record) in raw.records.into_iter().enumerate() {
            let stellar_temp = if raw.has_stellar_temp {
                record.stellar_temp.unwrap_or(fill)
            } else {
                0.0
            };
            features[[i, 0]] = record.orbital_period;
            features[[i, 1]] = record.transit_duration;
            features[[i, 2]] = record.planet_radius;
            features[[i, 3]] = stellar_temp;
            labels.push(record.label);
        }

        Ok(PreparedDataset::new(features, labels))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// The value missing stellar temperatures are replaced with.
fn stellar_temp_fill(raw: &RawDataset) -> f64 {
    if !raw.has_stellar_temp {
        return 0.0;
    }
    let present: Vec<f64> = raw.records.iter().filter_map(|r| r.stellar_temp).collect();
    median(present).unwrap_or(0.0)
}

/// Median of the given values; the mean of the two middle values
/// when the count is even. `None` for an empty input.
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::TransitRecord;

    fn record(temp: Option<f64>, label: &str) -> TransitRecord {
        TransitRecord::new(10.0, 3.0, 1.5, temp, label)
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(Vec::new()), None);
    }

    #[test]
    fn test_missing_temp_filled_with_median() {
        let raw = RawDataset::new(vec![
            record(Some(5000.0), "A"),
            record(None, "B"),
            record(Some(6000.0), "A"),
            record(Some(5500.0), "B"),
        ], true);
        let ds = Preprocessor::new().prepare(raw).unwrap();
        assert_eq!(ds.features[[1, 3]], 5500.0);
        assert_eq!(ds.features[[0, 3]], 5000.0);
    }

    #[test]
    fn test_absent_column_defaults_to_zero() {
        let raw = RawDataset::new(vec![
            record(None, "A"), record(None, "B"), record(None, "A"), record(None, "B"),
        ], false);
        let ds = Preprocessor::new().prepare(raw).unwrap();
        assert!(ds.features.column(3).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_column_defaults_to_zero() {
        let raw = RawDataset::new(vec![
            record(None, "A"), record(None, "B"), record(None, "A"), record(None, "B"),
        ], true);
        let ds = Preprocessor::new().prepare(raw).unwrap();
        assert!(ds.features.column(3).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_rejects_fewer_than_four_samples() {
        let raw = RawDataset::new(vec![record(None, "A"), record(None, "B"), record(None, "A")], true);
        let err = Preprocessor::new().prepare(raw).unwrap_err();
        assert_eq!(err, ValidationError::TooFewSamples { found: 3, min: 4 });
    }

    #[test]
    fn test_rejects_single_class() {
        let raw = RawDataset::new((0..20).map(|_| record(Some(5000.0), "A")).collect(), true);
        let err = Preprocessor::new().prepare(raw).unwrap_err();
        assert_eq!(err, ValidationError::TooFewClasses { found: 1 });
    }

    #[test]
    fn test_feature_order_matches_schema() {
        let raw = RawDataset::new(vec![
            TransitRecord::new(1.0, 2.0, 3.0, Some(4.0), "A"),
            TransitRecord::new(5.0, 6.0, 7.0, Some(8.0), "B"),
            TransitRecord::new(1.0, 2.0, 3.0, Some(4.0), "A"),
            TransitRecord::new(5.0, 6.0, 7.0, Some(8.0), "B"),
        ], true);
        let ds = Preprocessor::new().prepare(raw).unwrap();
        assert_eq!(ds.features.row(1).to_vec(), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(ds.labels[1], "B");
    }
}
