//! House Price Predictor CLI
//!
//! Trains the model bundle offline and exercises a running prediction
//! service.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, smoke, train};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// House Price Predictor CLI
#[derive(Parser)]
#[command(name = "hpp")]
#[command(author, version, about = "CLI for the House Price Predictor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via HPP_API_URL env var)
    #[arg(long, env = "HPP_API_URL", default_value = "http://localhost:5000", global = true)]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from the Ames Housing CSV and write its bundle
    Train(train::TrainArgs),

    /// Check that a running service answers health, info and prediction requests
    Smoke,

    /// Request one prediction from a running service
    Predict {
        /// JSON file with a feature object
        #[arg(long)]
        file: Option<PathBuf>,

        /// Feature value as Name=value (repeatable, overrides --file)
        #[arg(long = "feature", value_name = "NAME=VALUE")]
        features: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Train(args) => {
            train::run(&args, cli.format)?;
        }
        Commands::Smoke => {
            let client = client::ApiClient::new(&cli.api_url)?;
            smoke::run(&client).await?;
        }
        Commands::Predict { file, features } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::run(&client, file.as_deref(), &features, cli.format).await?;
        }
    }

    Ok(())
}
