// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Locate / download CSV sources (Layer 4 - data)
//   Step 2: Load and merge records        (Layer 4 - data)
//   Step 3: Impute and validate           (Layer 4 - data)
//   Step 4: Encode labels                 (Layer 4 - data)
//   Step 5: Choose the split strategy     (Layer 4 - data)
//   Step 6: Split train/test              (Layer 4 - data)
//   Step 7: Save config                   (Layer 6 - infra)
//   Step 8: Train, score, persist models  (Layer 5 - ml)
//   Step 9: Record the best model         (Layer 6 - infra)
//
// Validation (step 3) runs before anything is written, so a
// dataset that is too small leaves the models directory alone.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

use crate::data::{
    acquisition::{ensure_datasets, AcquisitionSettings, ArchiveClient, TableFetcher},
    encoder::LabelEncoder,
    loader::CsvDatasetLoader,
    preprocessor::Preprocessor,
    splitter::{SplitPlan, TrainTestSplit},
};
use crate::domain::traits::DatasetSource;
use crate::infra::{artifact_store::ArtifactStore, metrics::MetricsLogger};
use crate::ml::{
    model::{ModelConfig, ModelKind},
    trainer::{run_training, select_best, ModelScore},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Where data comes from and where models go. Relative paths are
// resolved against `base_dir`. Saved next to the artifacts so a
// run can be traced back to its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Explicit CSV to train on; None → default acquisition
    pub data_path:  Option<PathBuf>,
    pub base_dir:   PathBuf,
    pub models_dir: PathBuf,
    pub data_dir:   PathBuf,
    pub offline:    bool,
    pub seed:       u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:  None,
            base_dir:   PathBuf::from("."),
            models_dir: PathBuf::from("trained_models"),
            data_dir:   PathBuf::from("data/raw"),
            offline:    false,
            seed:       42,
        }
    }
}

impl TrainConfig {
    pub fn models_path(&self) -> PathBuf {
        self.base_dir.join(&self.models_dir)
    }

    pub fn data_dir_path(&self) -> PathBuf {
        self.base_dir.join(&self.data_dir)
    }

    pub fn resolved_data_path(&self) -> Option<PathBuf> {
        self.data_path.as_ref().map(|p| self.base_dir.join(p))
    }
}

// ─── Training Report ─────────────────────────────────────────────────────────
/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Per-model accuracy, in training order
    pub scores:     Vec<ModelScore>,
    pub best:       ModelKind,
    pub models_dir: PathBuf,
}

impl TrainingReport {
    /// Model name → accuracy.
    pub fn accuracies(&self) -> BTreeMap<&'static str, f64> {
        self.scores.iter().map(|s| (s.kind.name(), s.accuracy)).collect()
    }

    /// Scores sorted by accuracy, best first; equal scores keep
    /// training order.
    pub fn ranked(&self) -> Vec<&ModelScore> {
        let mut ranked: Vec<&ModelScore> = self.scores.iter().collect();
        ranked.sort_by(|a, b| b.accuracy.total_cmp(&a.accuracy));
        ranked
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline, downloading default datasets if needed.
    pub fn execute(&self) -> Result<TrainingReport> {
        self.execute_with(&ArchiveClient::default())
    }

    /// Run the pipeline with a specific table fetcher.
    pub fn execute_with(&self, fetcher: &dyn TableFetcher) -> Result<TrainingReport> {
        let cfg = &self.config;

        // ── Step 1: Locate sources ────────────────────────────────────────────
        let settings = AcquisitionSettings { data_dir: cfg.data_dir_path(), offline: cfg.offline };
        let sample   = cfg.resolved_data_path();
        let paths    = ensure_datasets(sample.as_deref(), &settings, fetcher)?;

        // ── Step 2: Load ──────────────────────────────────────────────────────
        let raw = CsvDatasetLoader::new(paths).load_all()?;

        // ── Step 3: Impute + validate ─────────────────────────────────────────
        let dataset = Preprocessor::new().prepare(raw)?;
        tracing::info!("Prepared {} samples, {} classes", dataset.sample_count(), dataset.class_count());

        // ── Step 4: Encode labels ─────────────────────────────────────────────
        let encoder = LabelEncoder::fit(&dataset.labels);
        let encoded = encoder.transform(&dataset.labels)?;
        println!("Label mapping: {:?}", encoder.mapping());

        // ── Step 5: Split strategy ────────────────────────────────────────────
        let counts: Vec<usize> = dataset.class_counts().values().copied().collect();
        let plan = SplitPlan::choose(&counts);
        println!(
            "Dataset size: {}, Test size: {}, Stratify: {}",
            dataset.sample_count(),
            plan.test_size,
            plan.stratify
        );

        // ── Step 6: Split ─────────────────────────────────────────────────────
        let split = TrainTestSplit::build(&dataset, &encoded, &plan, cfg.seed);

        // ── Step 7: Save config ───────────────────────────────────────────────
        let store  = ArtifactStore::new(cfg.models_path())?;
        store.save_config(cfg)?;
        let logger = MetricsLogger::new(store.dir())?;

        // ── Step 8: Train every model ─────────────────────────────────────────
        let scores = run_training(&ModelConfig::defaults(cfg.seed), &split, &encoder, &store, &logger)?;

        // ── Step 9: Best model ────────────────────────────────────────────────
        let best = select_best(&scores)
            .context("No model was trained")?
            .kind;
        store.save_best(best.name())?;
        tracing::info!("Best model: {}", best);

        Ok(TrainingReport { scores, best, models_dir: store.dir().to_path_buf() })
    }
}
