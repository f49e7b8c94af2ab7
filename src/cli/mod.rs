// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — trains all four classifiers, keeps the best
//   2. `predict` — classifies one observation with a saved model
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::acquisition::{locate_default_data, LARGE_DATASET};

#[derive(Parser, Debug)]
#[command(
    name = "exoplanet-trainer",
    version = "0.1.0",
    about = "Train exoplanet transit classifiers, keep the best, and classify new transits."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let mut config = TrainConfig::from(args);
    if config.data_path.is_none() {
        match locate_default_data(&config.base_dir) {
            Some(path) => {
                if path.ends_with(LARGE_DATASET) {
                    println!("Using large dataset: {}", path.display());
                } else {
                    println!("Large dataset not found, using sample: {}", path.display());
                }
                let relative = path.strip_prefix(&config.base_dir).map(Path::to_path_buf).unwrap_or(path);
                config.data_path = Some(relative);
            }
            None => println!("No local dataset found, falling back to default acquisition"),
        }
    }

    let report = TrainUseCase::new(config).execute()?;

    println!("\nModel performance (test accuracy):");
    for (rank, score) in report.ranked().iter().enumerate() {
        println!("  {}. {:<13} {:.4}", rank + 1, score.kind.name(), score.accuracy);
    }
    println!("\nAccuracies: {:?}", report.accuracies());
    println!("\nBest model: {} (saved to {})", report.best, report.models_dir.display());
    Ok(())
}

/// Handles the `predict` subcommand.
fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let use_case   = PredictUseCase::new(&args.models_dir, args.model)?;
    let prediction = use_case.predict(args.features())?;

    println!("\nModel:      {}", use_case.model_name());
    println!("Prediction: {}", prediction.label);
    for (label, p) in &prediction.probabilities {
        println!("  {:<16} {:.3}", label, p);
    }
    Ok(())
}
