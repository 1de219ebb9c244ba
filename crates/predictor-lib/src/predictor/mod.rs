//! Prediction pipeline: reconcile, scale, predict, format

mod features;
mod inference;
mod output;

pub use features::{parse_payload, reconcile, DEFAULT_FEATURE_VALUE, NO_DATA_MESSAGE};
pub use inference::PricePredictor;
pub use output::{
    confidence_range, missing_features_warning, round_cents, CURRENCY, LOWER_BAND_FACTOR,
    UPPER_BAND_FACTOR,
};

use crate::error::PredictError;
use crate::models::PredictionResult;
use serde_json::{Map, Value};

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Run one request's feature mapping through the pipeline
    fn predict(&self, input: &Map<String, Value>) -> Result<PredictionResult, PredictError>;

    /// Ordered feature schema the model expects
    fn feature_names(&self) -> &[String];

    /// Name of the regression algorithm
    fn algorithm(&self) -> &str;

    /// Name of the target transform inverted on output
    fn target_transform(&self) -> &str;
}
