// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Applies a saved artifact to new observations: checks the
// feature schema, runs the pipeline and turns class indices back
// into label strings (through the stored label mapping for
// models trained on codes).

use anyhow::{bail, Result};
use ndarray::Array2;

use crate::domain::record::FEATURES;
use crate::infra::artifact_store::ModelArtifact;
use crate::ml::model::Predictions;

/// Result for one observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label:         String,
    /// (label, probability), in class order
    pub probabilities: Vec<(String, f64)>,
}

pub struct Inferencer {
    artifact: ModelArtifact,
    classes:  Vec<String>,
}

impl Inferencer {
    pub fn new(artifact: ModelArtifact) -> Result<Self> {
        let expected: Vec<&str> = artifact.features.iter().map(String::as_str).collect();
        if expected != FEATURES {
            bail!(
                "Artifact '{}' expects features {:?}, this build provides {:?}",
                artifact.name,
                expected,
                FEATURES
            );
        }

        let classes = match (artifact.model.classes(), &artifact.label_encoder) {
            (Some(classes), _)     => classes.to_vec(),
            (None, Some(encoder))  => encoder.classes().to_vec(),
            (None, None)           => bail!("Artifact '{}' has no label mapping", artifact.name),
        };
        if classes.len() != artifact.model.n_classes() {
            bail!(
                "Artifact '{}' maps {} labels but its model has {} classes",
                artifact.name,
                classes.len(),
                artifact.model.n_classes()
            );
        }
        tracing::debug!("Inferencer ready: {} with {} classes", artifact.name, classes.len());
        Ok(Self { artifact, classes })
    }

    pub fn model_name(&self) -> &str {
        &self.artifact.name
    }

    /// Classify one observation given in FEATURES order.
    pub fn predict(&self, features: [f64; 4]) -> Result<Prediction> {
        if features.iter().any(|v| !v.is_finite()) {
            bail!("Feature values must be finite numbers, got {:?}", features);
        }
        let x = Array2::from_shape_vec((1, FEATURES.len()), features.to_vec())?;

        let label = match self.artifact.model.predict(x.view()) {
            Predictions::Labels(mut labels) => labels.pop(),
            Predictions::Codes(codes)       => codes.first().and_then(|&c| self.classes.get(c).cloned()),
        };
        let Some(label) = label else {
            bail!("Model '{}' produced no prediction", self.artifact.name);
        };

        let proba = self.artifact.model.predict_proba(x.view());
        let probabilities = self
            .classes
            .iter()
            .cloned()
            .zip(proba.row(0).iter().copied())
            .collect();

        Ok(Prediction { label, probabilities })
    }
}
