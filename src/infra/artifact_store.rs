// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Saves and restores trained model artifacts as JSON.
//
// What gets saved per training run:
//   1. {Name}.json        — one artifact per model: the fitted
//                           pipeline, the feature names it expects
//                           and, for XGBoost, the label mapping
//   2. BEST.txt           — the name of the winning model
//   3. train_config.json  — the configuration the run used
//
// File layout:
//   trained_models/
//     RandomForest.json
//     SVM.json
//     NeuralNet.json
//     XGBoost.json
//     BEST.txt
//     train_config.json
//     metrics.csv         ← written by MetricsLogger
//
// Floats are written with serde_json's float_roundtrip feature,
// so a reloaded model predicts exactly what the saved one did.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::data::encoder::LabelEncoder;
use crate::domain::traits::Persistable;
use crate::ml::model::ModelPipeline;

const BEST_FILE: &str   = "BEST.txt";
const CONFIG_FILE: &str = "train_config.json";

/// A fitted pipeline plus what is needed to apply it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name:          String,
    pub model:         ModelPipeline,
    pub features:      Vec<String>,
    /// Present when the model predicts integer codes
    pub label_encoder: Option<LabelEncoder>,
}

impl Persistable for ModelArtifact {
    fn save(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Cannot create artifact '{}'", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to serialise artifact '{}'", self.name))?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)
            .with_context(|| format!("Cannot open artifact '{}'. Have you run 'train' first?", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("'{}' is not a valid model artifact", path.display()))
    }
}

/// Manages the models directory.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create models directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing store without creating anything.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            bail!("Models directory '{}' does not exist. Have you run 'train' first?", dir.display());
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn save_artifact(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.artifact_path(&artifact.name);
        artifact.save(&path)?;
        tracing::debug!("Saved {} artifact to '{}'", artifact.name, path.display());
        Ok(path)
    }

    pub fn load_artifact(&self, name: &str) -> Result<ModelArtifact> {
        let artifact = ModelArtifact::load(&self.artifact_path(name))?;
        if artifact.name != name {
            bail!("Artifact file for '{}' contains model '{}'", name, artifact.name);
        }
        Ok(artifact)
    }

    /// Record the winning model's name in BEST.txt.
    pub fn save_best(&self, name: &str) -> Result<()> {
        let path = self.dir.join(BEST_FILE);
        fs::write(&path, name)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    pub fn load_best(&self) -> Result<String> {
        let path = self.dir.join(BEST_FILE);
        let name = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'. Have you run 'train' first?", path.display()))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("'{}' is empty", path.display());
        }
        Ok(name.to_string())
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    #[cfg(test)]
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::feature_names;
    use crate::ml::forest::ForestParams;
    use crate::ml::model::{ModelConfig, Predictions, Targets};
    use ndarray::Array2;

    fn artifact() -> (ModelArtifact, Array2<f64>) {
        let x = Array2::from_shape_fn((12, 4), |(i, j)| (i * (j + 1)) as f64 + if i % 2 == 0 { 0.0 } else { 50.0 });
        let labels: Vec<String> = (0..12).map(|i| if i % 2 == 0 { "A" } else { "B" }.to_string()).collect();
        let config = ModelConfig::RandomForest(ForestParams { n_estimators: 5, ..ForestParams::default() });
        let model  = config.fit(x.view(), Targets::Labels(&labels)).unwrap();
        let artifact = ModelArtifact {
            name: "RandomForest".into(),
            model,
            features: feature_names(),
            label_encoder: Some(LabelEncoder::fit(&labels)),
        };
        (artifact, x)
    }

    #[test]
    fn test_artifact_survives_reload() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("models")).unwrap();
        let (saved, x) = artifact();

        let path = store.save_artifact(&saved).unwrap();
        assert!(path.ends_with("RandomForest.json"));

        let loaded = store.load_artifact("RandomForest").unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(loaded.features, feature_names());
        assert_eq!(loaded.model.predict(x.view()), saved.model.predict(x.view()));
        assert!(matches!(loaded.model.predict(x.view()), Predictions::Labels(_)));
    }

    #[test]
    fn test_best_marker() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        assert!(store.load_best().is_err());
        store.save_best("SVM").unwrap();
        assert_eq!(store.load_best().unwrap(), "SVM");
        assert_eq!(fs::read_to_string(dir.path().join("BEST.txt")).unwrap(), "SVM");
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        assert!(store.load_artifact("XGBoost").is_err());
    }

    #[test]
    fn test_open_requires_existing_directory() {
        let dir     = tempfile::tempdir().unwrap();
        let missing = dir.path().join("mistyped");
        assert!(ArtifactStore::open(&missing).is_err());
        assert!(!missing.exists());

        ArtifactStore::new(&missing).unwrap().save_best("SVM").unwrap();
        assert_eq!(ArtifactStore::open(&missing).unwrap().load_best().unwrap(), "SVM");
    }
}
