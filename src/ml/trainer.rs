// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Fits every model configuration on the same split, scores it on
// the held-out rows and persists it before moving on.
//
// Per configuration, in order:
//   1. Fit  (encoded labels for XGBoost, label strings otherwise)
//   2. Predict the test split; decode XGBoost's codes back into
//      label strings before scoring
//   3. Accuracy + classification report → stdout / metrics.csv
//   4. Save the artifact (pipeline + features [+ label mapping])
//
// Any failure aborts the loop: artifacts of models that already
// finished stay on disk, later models are not trained.

use anyhow::{Context, Result};

use crate::data::{encoder::LabelEncoder, splitter::TrainTestSplit};
use crate::domain::record::feature_names;
use crate::infra::{
    artifact_store::{ArtifactStore, ModelArtifact},
    metrics::{ClassificationReport, MetricsLogger},
};
use crate::ml::model::{ModelConfig, ModelKind, Predictions, Targets};

/// Held-out accuracy of one trained model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    pub kind:     ModelKind,
    pub accuracy: f64,
}

pub fn run_training(
    configs: &[ModelConfig],
    split:   &TrainTestSplit,
    encoder: &LabelEncoder,
    store:   &ArtifactStore,
    logger:  &MetricsLogger,
) -> Result<Vec<ModelScore>> {
    let mut scores = Vec::with_capacity(configs.len());

    for config in configs {
        let kind = config.kind();
        println!("Training {kind}...");
        tracing::info!("Fitting {} on {} rows", kind, split.x_train.nrows());

        // ── Fit ───────────────────────────────────────────────────────────────
        let targets = if kind.uses_encoded_labels() {
            Targets::Encoded { codes: &split.y_train_encoded, n_classes: encoder.len() }
        } else {
            Targets::Labels(&split.y_train)
        };
        let model = config
            .fit(split.x_train.view(), targets)
            .with_context(|| format!("Training {kind} failed"))?;

        // ── Evaluate ──────────────────────────────────────────────────────────
        let predicted = match model.predict(split.x_test.view()) {
            Predictions::Labels(labels) => labels,
            Predictions::Codes(codes)   => {
                let hits = codes.iter().zip(&split.y_test_encoded).filter(|(p, t)| p == t).count();
                tracing::debug!("{} matched {}/{} encoded test labels", kind, hits, codes.len());
                encoder
                    .inverse_transform(&codes)
                    .with_context(|| format!("Cannot decode {kind} predictions"))?
            }
        };
        let report = ClassificationReport::new(&split.y_test, &predicted);
        println!("{kind} accuracy: {:.4}", report.accuracy);
        tracing::debug!("{} classification report:\n{}", kind, report.render());
        logger.log(kind.name(), &report)?;

        // ── Persist ───────────────────────────────────────────────────────────
        let artifact = ModelArtifact {
            name:          kind.name().to_string(),
            model,
            features:      feature_names(),
            label_encoder: kind.uses_encoded_labels().then(|| encoder.clone()),
        };
        let path = store.save_artifact(&artifact)?;
        tracing::info!("Saved {} to '{}'", kind, path.display());

        scores.push(ModelScore { kind, accuracy: report.accuracy });
    }

    Ok(scores)
}

/// Highest accuracy; the earliest entry wins ties.
pub fn select_best(scores: &[ModelScore]) -> Option<&ModelScore> {
    let mut best: Option<&ModelScore> = None;
    for score in scores {
        match best {
            Some(b) if score.accuracy <= b.accuracy => {}
            _ => best = Some(score),
        }
    }
    best
}
