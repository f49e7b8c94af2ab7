// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Most failures in this crate travel as anyhow::Error with
// context attached. The ones below are typed because callers
// (and tests) need to tell them apart: a dataset that is too
// small to train on is a user problem, not an I/O problem.

use thiserror::Error;

/// Raised by data preparation before any model is trained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("dataset must contain at least {min} samples to train and test models (found {found})")]
    TooFewSamples { found: usize, min: usize },

    #[error("dataset must contain at least two classes to train a classifier (found {found})")]
    TooFewClasses { found: usize },

    #[error("no usable rows in '{source_name}': every row is missing its label or a required feature")]
    NoUsableRows { source_name: String },

    #[error("'{source_name}' has no '{column}' column (or a known alias for it)")]
    MissingColumn { source_name: String, column: String },
}

/// Raised by the label encoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("label '{0}' was not seen when the encoder was fitted")]
    UnknownLabel(String),

    #[error("class code {code} is out of range for {classes} known classes")]
    CodeOutOfRange { code: usize, classes: usize },
}
