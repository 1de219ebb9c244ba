//! Offline model training command

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use predictor_lib::{
    estimator::ForestParams,
    training::{Algorithm, Trainer, TrainingConfig, TrainingOutcome},
    StructuredLogger,
};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::output::{color_r2, format_currency, print_success, print_table, OutputFormat};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AlgorithmArg {
    RandomForest,
    Ridge,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::RandomForest => Algorithm::RandomForest,
            AlgorithmArg::Ridge => Algorithm::Ridge,
        }
    }
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Ames Housing CSV file
    #[arg(long, default_value = "AmesHousing.csv")]
    pub data: PathBuf,

    /// Where to write the model bundle
    #[arg(long, short, default_value = "house_price_model.json")]
    pub output: PathBuf,

    /// Regression algorithm
    #[arg(long, value_enum, default_value = "random-forest")]
    pub algorithm: AlgorithmArg,

    /// Number of trees (random forest)
    #[arg(long, default_value_t = 100)]
    pub n_estimators: usize,

    /// Maximum tree depth, unlimited if not set (random forest)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Minimum samples per leaf (random forest)
    #[arg(long, default_value_t = 1)]
    pub min_samples_leaf: usize,

    /// L2 penalty (ridge)
    #[arg(long, default_value_t = 1.0)]
    pub alpha: f64,

    /// Fraction of rows held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Seed for the split and the forest's bootstrap samples
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl TrainArgs {
    fn config(&self) -> TrainingConfig {
        TrainingConfig {
            algorithm: self.algorithm.into(),
            forest: ForestParams {
                n_estimators: self.n_estimators,
                max_depth: self.max_depth,
                min_samples_leaf: self.min_samples_leaf,
                ..ForestParams::default()
            },
            ridge_alpha: self.alpha,
            test_size: self.test_size,
            seed: self.seed,
        }
    }
}

/// Summary printed after training
#[derive(Debug, Serialize)]
struct TrainingReport {
    algorithm: String,
    output: String,
    n_train: usize,
    n_test: usize,
    rows_dropped: usize,
    cells_imputed: usize,
    mae: f64,
    rmse: f64,
    r2: f64,
}

impl TrainingReport {
    fn new(outcome: &TrainingOutcome, output: &str) -> Self {
        let meta = outcome.bundle.metadata();
        Self {
            algorithm: outcome.bundle.regressor().algorithm().to_string(),
            output: output.to_string(),
            n_train: meta.n_train,
            n_test: meta.n_test,
            rows_dropped: outcome.rows_dropped,
            cells_imputed: outcome.cells_imputed,
            mae: outcome.evaluation.mae,
            rmse: outcome.evaluation.rmse,
            r2: outcome.evaluation.r2,
        }
    }
}

#[derive(Tabled, Serialize)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Train a model and write its bundle
pub fn run(args: &TrainArgs, format: OutputFormat) -> Result<()> {
    let trainer = Trainer::new(args.config());
    let outcome = trainer
        .train_from_path(&args.data)
        .with_context(|| format!("Training on {} failed", args.data.display()))?;

    outcome
        .bundle
        .save(&args.output)
        .with_context(|| format!("Failed to write model bundle to {}", args.output.display()))?;

    let report = TrainingReport::new(&outcome, &args.output.display().to_string());
    StructuredLogger::new("hpp").log_training_complete(
        &report.algorithm,
        report.n_train,
        report.n_test,
        report.mae,
        report.rmse,
        report.r2,
    );

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => {
            println!("{}", "Model Performance".bold());
            println!("{}", "=".repeat(40));
            println!("Algorithm:      {}", report.algorithm.cyan());
            println!("Training rows:  {}", report.n_train);
            println!("Held-out rows:  {}", report.n_test);
            println!(
                "Cleaning:       {} rows dropped, {} cells imputed",
                report.rows_dropped, report.cells_imputed
            );
            println!();

            let rows = vec![
                MetricRow {
                    metric: "MAE".to_string(),
                    value: format_currency(report.mae, "USD"),
                },
                MetricRow {
                    metric: "RMSE".to_string(),
                    value: format_currency(report.rmse, "USD"),
                },
                MetricRow {
                    metric: "R² Score".to_string(),
                    value: color_r2(report.r2),
                },
            ];
            print_table(&rows, format);
            println!();
            print_success(&format!("Model saved to {}", report.output));
        }
    }

    Ok(())
}
