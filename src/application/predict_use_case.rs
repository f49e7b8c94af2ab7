// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Classifies one observation with a saved model:
//   1. Pick the artifact: the named model, or the one BEST.txt names
//   2. Load it from the models directory
//   3. Run the inferencer on the four feature values

use anyhow::Result;
use std::path::PathBuf;

use crate::infra::artifact_store::ArtifactStore;
use crate::ml::{
    inferencer::{Inferencer, Prediction},
    model::ModelKind,
};

pub struct PredictUseCase {
    inferencer: Inferencer,
}

impl PredictUseCase {
    /// Load `model`, or the recorded best model when None.
    pub fn new(models_dir: impl Into<PathBuf>, model: Option<ModelKind>) -> Result<Self> {
        let store = ArtifactStore::open(models_dir)?;
        let name  = match model {
            Some(kind) => kind.name().to_string(),
            None       => store.load_best()?,
        };
        tracing::info!("Loading '{}' from '{}'", name, store.dir().display());
        let inferencer = Inferencer::new(store.load_artifact(&name)?)?;
        Ok(Self { inferencer })
    }

    pub fn model_name(&self) -> &str {
        self.inferencer.model_name()
    }

    /// Features in order: orbital period, transit duration,
    /// planet radius, stellar temperature.
    pub fn predict(&self, features: [f64; 4]) -> Result<Prediction> {
        self.inferencer.predict(features)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::feature_names;
    use crate::infra::artifact_store::ModelArtifact;
    use crate::ml::forest::ForestParams;
    use crate::ml::model::{ModelConfig, Targets};
    use ndarray::Array2;

    fn save_forest(store: &ArtifactStore) {
        let x = Array2::from_shape_fn((16, 4), |(i, j)| if i % 2 == 0 { j as f64 } else { 100.0 + j as f64 });
        let labels: Vec<String> = (0..16).map(|i| if i % 2 == 0 { "CONFIRMED" } else { "FALSE POSITIVE" }.to_string()).collect();
        let config = ModelConfig::RandomForest(ForestParams { n_estimators: 5, ..ForestParams::default() });
        let model  = config.fit(x.view(), Targets::Labels(&labels)).unwrap();
        store
            .save_artifact(&ModelArtifact {
                name: "RandomForest".into(),
                model,
                features: feature_names(),
                label_encoder: None,
            })
            .unwrap();
    }

    #[test]
    fn test_best_model_is_used_by_default() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        save_forest(&store);
        store.save_best("RandomForest").unwrap();

        let use_case = PredictUseCase::new(dir.path(), None).unwrap();
        assert_eq!(use_case.model_name(), "RandomForest");
        let prediction = use_case.predict([100.0, 101.0, 102.0, 103.0]).unwrap();
        assert_eq!(prediction.label, "FALSE POSITIVE");
        assert_eq!(prediction.probabilities.len(), 2);
    }

    #[test]
    fn test_missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PredictUseCase::new(dir.path(), Some(ModelKind::Svm)).is_err());
        assert!(PredictUseCase::new(dir.path(), None).is_err());
    }

    #[test]
    fn test_unknown_models_dir_is_not_created() {
        let dir     = tempfile::tempdir().unwrap();
        let missing = dir.path().join("trained_modles");
        assert!(PredictUseCase::new(&missing, None).is_err());
        assert!(!missing.exists());
    }
}
