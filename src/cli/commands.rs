// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `predict`, and all
// their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::ModelKind;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train every classifier and keep the most accurate one
    Train(TrainArgs),

    /// Classify one transit observation with a saved model
    Predict(PredictArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV file to train on. Without it, a bundled export or the
    /// sample file in --base-dir is used, else the archive tables
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Directory that relative paths are resolved against
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Where artifacts, BEST.txt and metrics.csv are written
    #[arg(long, default_value = "trained_models")]
    pub models_dir: PathBuf,

    /// Where downloaded archive tables are cached
    #[arg(long, default_value = "data/raw")]
    pub data_dir: PathBuf,

    /// Never download; use only files already on disk
    #[arg(long)]
    pub offline: bool,

    /// Seed for the split and every model
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:  a.data,
            base_dir:   a.base_dir,
            models_dir: a.models_dir,
            data_dir:   a.data_dir,
            offline:    a.offline,
            seed:       a.seed,
        }
    }
}

/// All arguments for the `predict` command.
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model to use (RandomForest, SVM, NeuralNet, XGBoost);
    /// defaults to the one named in BEST.txt
    #[arg(long)]
    pub model: Option<ModelKind>,

    /// Directory the models were saved to
    #[arg(long, default_value = "trained_models")]
    pub models_dir: PathBuf,

    /// Orbital period [days]
    #[arg(long)]
    pub orbital_period: f64,

    /// Transit duration [hours]
    #[arg(long)]
    pub transit_duration: f64,

    /// Planet radius [Earth radii]
    #[arg(long)]
    pub planet_radius: f64,

    /// Stellar effective temperature [K]; 0 when unknown
    #[arg(long, default_value_t = 0.0)]
    pub stellar_temp: f64,
}

impl PredictArgs {
    pub fn features(&self) -> [f64; 4] {
        [self.orbital_period, self.transit_duration, self.planet_radius, self.stellar_temp]
    }
}
