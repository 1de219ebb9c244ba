//! Price API - house price prediction service
//!
//! Loads the model bundle written by `hpp train` once at startup and serves
//! predictions over HTTP until interrupted.

use anyhow::{Context, Result};
use predictor_lib::PricePredictor;
use price_api::{
    api::{self, AppState, SERVICE_VERSION},
    config::ServiceConfig,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load()?;

    // RUST_LOG takes precedence over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(fmt::layer().json())
        .init();

    info!(model_path = %config.model_path, environment = %config.environment, "Starting price-api");

    // A service without a valid model is useless; refuse to start
    let predictor = PricePredictor::from_path(&config.model_path)
        .with_context(|| format!("Failed to load model bundle from {}", config.model_path))?;

    let state = AppState::new(Arc::new(predictor), config.environment.clone());
    state.logger.log_model_loaded(
        &config.model_path,
        state.predictor.algorithm(),
        state.predictor.feature_names().len(),
    );
    state
        .logger
        .log_startup(SERVICE_VERSION, &config.bind_addr(), &config.environment);

    let logger = state.logger.clone();
    api::serve(&config, Arc::new(state)).await?;

    logger.log_shutdown("SIGINT received");
    Ok(())
}
