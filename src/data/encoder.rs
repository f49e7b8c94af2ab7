// ============================================================
// Layer 4 — Label Encoder
// ============================================================
// Two-way lookup between label strings and the contiguous codes
// 0..k that the gradient-boosted model trains on. Codes follow
// sorted label order, so the same label set always produces the
// same mapping regardless of row order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::EncodingError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// classes[code] = label
    classes: Vec<String>,

    /// label → code
    index: BTreeMap<String, usize>,
}

impl LabelEncoder {
    /// Learn the sorted set of distinct labels.
    pub fn fit(labels: &[String]) -> Self {
        let mut classes: Vec<String> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let index = classes
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code))
            .collect();
        Self { classes, index }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn encode(&self, label: &str) -> Result<usize, EncodingError> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| EncodingError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, code: usize) -> Result<&str, EncodingError> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or(EncodingError::CodeOutOfRange { code, classes: self.classes.len() })
    }

    pub fn transform(&self, labels: &[String]) -> Result<Vec<usize>, EncodingError> {
        labels.iter().map(|l| self.encode(l)).collect()
    }

    pub fn inverse_transform(&self, codes: &[usize]) -> Result<Vec<String>, EncodingError> {
        codes.iter().map(|&c| self.decode(c).map(str::to_string)).collect()
    }

    /// The label → code table, for display.
    pub fn mapping(&self) -> &BTreeMap<String, usize> {
        &self.index
    }
}
