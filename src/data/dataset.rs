use std::collections::BTreeMap;

use ndarray::Array2;

use crate::domain::record::FEATURES;

/// Clean, fully numeric training data: one row per sample, one
/// column per entry of [`FEATURES`], plus the matching labels.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub features: Array2<f64>,
    pub labels:   Vec<String>,
}

impl PreparedDataset {
    pub fn new(features: Array2<f64>, labels: Vec<String>) -> Self {
        debug_assert_eq!(features.nrows(), labels.len());
        debug_assert_eq!(features.ncols(), FEATURES.len());
        Self { features, labels }
    }

    pub fn sample_count(&self) -> usize {
        self.labels.len()
    }

    /// Member count per distinct label, in sorted label order.
    pub fn class_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn class_count(&self) -> usize {
        self.class_counts().len()
    }
}
