// ============================================================
// Layer 3 — Transit Records
// ============================================================
// One row of exoplanet transit data after column names have
// been resolved, and the concatenation of all rows loaded in a
// run. Everything here is a plain data struct: the numeric
// features are already parsed, the label is already normalised,
// and only `stellar_temp` may still be missing.

use serde::{Deserialize, Serialize};

/// The four predictor columns, in the order every model sees them.
pub const FEATURES: [&str; 4] = [
    "orbital_period",
    "transit_duration",
    "planet_radius",
    "stellar_temp",
];

/// The categorical target column.
pub const TARGET: &str = "label";

/// Owned copy of [`FEATURES`], stored inside every artifact.
pub fn feature_names() -> Vec<String> {
    FEATURES.iter().map(|f| f.to_string()).collect()
}

/// A single labelled transit observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitRecord {
    /// Orbital period in days
    pub orbital_period: f64,

    /// Transit duration in hours
    pub transit_duration: f64,

    /// Planet radius in Earth radii
    pub planet_radius: f64,

    /// Host star effective temperature in Kelvin; imputed later when absent
    pub stellar_temp: Option<f64>,

    /// Disposition class, e.g. CONFIRMED / CANDIDATE / FALSE POSITIVE
    pub label: String,
}

impl TransitRecord {
    pub fn new(
        orbital_period:   f64,
        transit_duration: f64,
        planet_radius:    f64,
        stellar_temp:     Option<f64>,
        label:            impl Into<String>,
    ) -> Self {
        Self {
            orbital_period,
            transit_duration,
            planet_radius,
            stellar_temp,
            label: label.into(),
        }
    }
}

/// All records loaded in one run, plus whether any source carried
/// a stellar temperature column at all.
///
/// The distinction matters for imputation: rows from a source that
/// lacked the column are filled with the median of the others, but
/// if no source had the column the feature is a constant 0.
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub records:          Vec<TransitRecord>,
    pub has_stellar_temp: bool,
}

impl RawDataset {
    pub fn new(records: Vec<TransitRecord>, has_stellar_temp: bool) -> Self {
        Self { records, has_stellar_temp }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append another source's rows (row-wise concatenation).
    pub fn merge(&mut self, other: RawDataset) {
        self.has_stellar_temp |= other.has_stellar_temp;
        self.records.extend(other.records);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_column_presence() {
        let mut a = RawDataset::new(vec![TransitRecord::new(1.0, 2.0, 3.0, None, "A")], false);
        let b     = RawDataset::new(vec![TransitRecord::new(4.0, 5.0, 6.0, Some(5700.0), "B")], true);
        a.merge(b);
        assert_eq!(a.len(), 2);
        assert!(a.has_stellar_temp);
    }

    #[test]
    fn test_feature_names_match_schema() {
        assert_eq!(feature_names(), vec![
            "orbital_period", "transit_duration", "planet_radius", "stellar_temp",
        ]);
    }
}
