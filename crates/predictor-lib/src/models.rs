//! Core data models for the prediction pipeline

use serde::{Deserialize, Serialize};

/// Request features aligned to the bundle's column order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// One value per bundle feature, in bundle order
    pub values: Vec<f64>,
    /// Features absent from the request that were defaulted to zero
    pub missing: Vec<String>,
}

/// Heuristic band around a point estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRange {
    pub lower: f64,
    pub upper: f64,
}

/// Unrounded outcome of one pass through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Price in original units after inverting the target transform
    pub price: f64,
    pub missing_features: Vec<String>,
}

/// JSON body returned by `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_price: f64,
    pub currency: String,
    pub confidence_range: ConfidenceRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
