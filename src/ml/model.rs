// ============================================================
// Layer 5 — Model Configurations and Pipelines
// ============================================================
// A model configuration is one variant per classifier kind,
// each carrying its own hyperparameters. Fitting one produces a
// pipeline: a StandardScaler followed by the fitted classifier.
//
// Targets come in two forms:
//   - label strings (RandomForest, SVM, NeuralNet): the pipeline
//     learns its own sorted class list and predicts strings
//   - integer codes (XGBoost): the pipeline predicts codes and
//     the caller decodes them with the shared LabelEncoder
//
// The fixed training order is RandomForest, SVM, NeuralNet,
// XGBoost; ModelKind::ALL lists them in that order.

use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::ml::{
    boosting::{BoostingParams, GradientBoosting},
    classifier::Classifier,
    forest::{ForestParams, RandomForest},
    mlp::{MlpClassifier, MlpParams},
    scaler::StandardScaler,
    svm::{SvmClassifier, SvmParams},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    Svm,
    NeuralNet,
    XGBoost,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::RandomForest,
        ModelKind::Svm,
        ModelKind::NeuralNet,
        ModelKind::XGBoost,
    ];

    /// Name used for artifacts, BEST.txt and reports.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::RandomForest => "RandomForest",
            ModelKind::Svm          => "SVM",
            ModelKind::NeuralNet    => "NeuralNet",
            ModelKind::XGBoost      => "XGBoost",
        }
    }

    /// Whether this model trains on integer-encoded labels.
    pub fn uses_encoded_labels(self) -> bool {
        matches!(self, ModelKind::XGBoost)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = ModelKind::ALL.iter().map(|k| k.name()).collect();
                format!("unknown model '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelConfig {
    RandomForest(ForestParams),
    Svm(SvmParams),
    NeuralNet(MlpParams),
    XGBoost(BoostingParams),
}

impl ModelConfig {
    /// The four configurations, in training order, seeded with `seed`.
    pub fn defaults(seed: u64) -> Vec<ModelConfig> {
        vec![
            ModelConfig::RandomForest(ForestParams { seed, ..ForestParams::default() }),
            ModelConfig::Svm(SvmParams::default()),
            ModelConfig::NeuralNet(MlpParams { seed, ..MlpParams::default() }),
            ModelConfig::XGBoost(BoostingParams { seed, ..BoostingParams::default() }),
        ]
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelConfig::RandomForest(_) => ModelKind::RandomForest,
            ModelConfig::Svm(_)          => ModelKind::Svm,
            ModelConfig::NeuralNet(_)    => ModelKind::NeuralNet,
            ModelConfig::XGBoost(_)      => ModelKind::XGBoost,
        }
    }

    /// Scale `x`, then fit this configuration's classifier on it.
    pub fn fit(&self, x: ArrayView2<'_, f64>, targets: Targets<'_>) -> Result<ModelPipeline> {
        let (codes, n_classes, target) = targets.into_codes()?;
        if codes.len() != x.nrows() {
            bail!("{} rows but {} targets", x.nrows(), codes.len());
        }

        let scaler = StandardScaler::fit(x);
        let scaled = scaler.transform(x);
        let xs     = scaled.view();

        let classifier = match self {
            ModelConfig::RandomForest(p) => FittedClassifier::RandomForest(RandomForest::fit(p, xs, &codes, n_classes)?),
            ModelConfig::Svm(p)          => FittedClassifier::Svm(SvmClassifier::fit(p, xs, &codes, n_classes)?),
            ModelConfig::NeuralNet(p)    => FittedClassifier::NeuralNet(MlpClassifier::fit(p, xs, &codes, n_classes)?),
            ModelConfig::XGBoost(p)      => FittedClassifier::XGBoost(GradientBoosting::fit(p, xs, &codes, n_classes)?),
        };
        Ok(ModelPipeline { scaler, classifier, target })
    }
}

/// Training targets for one fit.
pub enum Targets<'a> {
    /// Label strings; the pipeline learns the sorted class list.
    Labels(&'a [String]),
    /// Codes 0..n_classes from an external encoder.
    Encoded { codes: &'a [usize], n_classes: usize },
}

impl Targets<'_> {
    fn into_codes(self) -> Result<(Vec<usize>, usize, TargetEncoding)> {
        match self {
            Targets::Labels(labels) => {
                let mut classes: Vec<String> = labels.to_vec();
                classes.sort_unstable();
                classes.dedup();
                let codes = labels
                    .iter()
                    .map(|l| classes.binary_search(l).unwrap_or_default())
                    .collect();
                let n = classes.len();
                Ok((codes, n, TargetEncoding::Labels(classes)))
            }
            Targets::Encoded { codes, n_classes } => {
                if let Some(&bad) = codes.iter().find(|&&c| c >= n_classes) {
                    bail!("class code {} is out of range for {} classes", bad, n_classes);
                }
                Ok((codes.to_vec(), n_classes, TargetEncoding::Codes { n_classes }))
            }
        }
    }
}

/// How a pipeline's class indices map onto outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetEncoding {
    /// classes[k] is the label of class k
    Labels(Vec<String>),
    /// Class k is code k
    Codes { n_classes: usize },
}

/// Output of ModelPipeline::predict.
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    Labels(Vec<String>),
    Codes(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedClassifier {
    RandomForest(RandomForest),
    Svm(SvmClassifier),
    NeuralNet(MlpClassifier),
    XGBoost(GradientBoosting),
}

impl FittedClassifier {
    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            FittedClassifier::RandomForest(m) => m,
            FittedClassifier::Svm(m)          => m,
            FittedClassifier::NeuralNet(m)    => m,
            FittedClassifier::XGBoost(m)      => m,
        }
    }
}

impl Classifier for FittedClassifier {
    fn n_classes(&self) -> usize {
        self.as_classifier().n_classes()
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self.as_classifier().predict_proba(x)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        self.as_classifier().predict(x)
    }
}

/// StandardScaler → classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPipeline {
    scaler:     StandardScaler,
    classifier: FittedClassifier,
    target:     TargetEncoding,
}

impl ModelPipeline {
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Predictions {
        let codes = self.classifier.predict(self.scaler.transform(x).view());
        match &self.target {
            TargetEncoding::Labels(classes) => {
                Predictions::Labels(codes.into_iter().map(|c| classes[c].clone()).collect())
            }
            TargetEncoding::Codes { .. } => Predictions::Codes(codes),
        }
    }

    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self.classifier.predict_proba(self.scaler.transform(x).view())
    }

    /// Label strings in probability-column order, when the pipeline
    /// was fitted on labels.
    pub fn classes(&self) -> Option<&[String]> {
        match &self.target {
            TargetEncoding::Labels(classes) => Some(classes),
            TargetEncoding::Codes { .. }    => None,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.classifier.n_classes()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> (Array2<f64>, Vec<String>) {
        let mut data   = Vec::new();
        let mut labels = Vec::new();
        for i in 0..24 {
            let t = i as f64 * 0.1;
            if i % 2 == 0 {
                data.extend_from_slice(&[2.0 + t, 3.0, 1.0 + t, 5500.0]);
                labels.push("CONFIRMED".to_string());
            } else {
                data.extend_from_slice(&[40.0 + t, 9.0, 15.0 + t, 6500.0]);
                labels.push("FALSE POSITIVE".to_string());
            }
        }
        (Array2::from_shape_vec((24, 4), data).unwrap(), labels)
    }

    fn quick(kind: ModelKind) -> ModelConfig {
        match kind {
            ModelKind::RandomForest => ModelConfig::RandomForest(ForestParams { n_estimators: 10, ..Default::default() }),
            ModelKind::Svm          => ModelConfig::Svm(SvmParams::default()),
            ModelKind::NeuralNet    => ModelConfig::NeuralNet(MlpParams { max_iter: 30, ..Default::default() }),
            ModelKind::XGBoost      => ModelConfig::XGBoost(BoostingParams { n_estimators: 10, ..Default::default() }),
        }
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(kind.name().parse::<ModelKind>().unwrap(), kind);
        }
        assert_eq!("svm".parse::<ModelKind>().unwrap(), ModelKind::Svm);
        assert!("Perceptron".parse::<ModelKind>().is_err());
    }

    #[test]
    fn test_defaults_follow_training_order() {
        let kinds: Vec<_> = ModelConfig::defaults(42).iter().map(ModelConfig::kind).collect();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
        assert!(ModelKind::XGBoost.uses_encoded_labels());
        assert!(!ModelKind::Svm.uses_encoded_labels());
    }

    #[test]
    fn test_label_pipelines_predict_strings() {
        let (x, labels) = toy();
        for kind in [ModelKind::RandomForest, ModelKind::Svm, ModelKind::NeuralNet] {
            let pipeline = quick(kind).fit(x.view(), Targets::Labels(&labels)).unwrap();
            assert_eq!(pipeline.classes().unwrap(), ["CONFIRMED", "FALSE POSITIVE"]);
            assert_eq!(pipeline.predict(x.view()), Predictions::Labels(labels.clone()), "{kind}");
        }
    }

    #[test]
    fn test_encoded_pipeline_predicts_codes() {
        let (x, labels) = toy();
        let codes: Vec<usize> = labels.iter().map(|l| usize::from(l != "CONFIRMED")).collect();
        let pipeline = quick(ModelKind::XGBoost)
            .fit(x.view(), Targets::Encoded { codes: &codes, n_classes: 2 })
            .unwrap();
        assert_eq!(pipeline.classes(), None);
        assert_eq!(pipeline.predict(x.view()), Predictions::Codes(codes));
    }

    #[test]
    fn test_out_of_range_code_is_rejected() {
        let (x, _) = toy();
        let codes = vec![5; 24];
        let result = quick(ModelKind::XGBoost).fit(x.view(), Targets::Encoded { codes: &codes, n_classes: 2 });
        assert!(result.is_err());
    }
}
