//! Prediction output formatting
//!
//! Rounds the point estimate to cents and derives the confidence band. The
//! band is a fixed ±10% of the estimate: it is not derived from the model's
//! residuals and carries no calibrated coverage.

use crate::models::{ConfidenceRange, PredictionResponse, PredictionResult};

/// Multiplier for the lower edge of the band
pub const LOWER_BAND_FACTOR: f64 = 0.9;

/// Multiplier for the upper edge of the band
pub const UPPER_BAND_FACTOR: f64 = 1.1;

pub const CURRENCY: &str = "USD";

/// Round half away from zero to two decimal places
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Band computed from the unrounded estimate. A negative estimate yields
/// `lower > upper`; it is reported as-is.
pub fn confidence_range(price: f64) -> ConfidenceRange {
    ConfidenceRange {
        lower: round_cents(price * LOWER_BAND_FACTOR),
        upper: round_cents(price * UPPER_BAND_FACTOR),
    }
}

/// Warning listing defaulted features, `None` when nothing was missing
pub fn missing_features_warning(missing: &[String]) -> Option<String> {
    if missing.is_empty() {
        return None;
    }
    let listed: Vec<String> = missing.iter().map(|name| format!("'{}'", name)).collect();
    Some(format!(
        "Some features were missing and set to default: [{}]",
        listed.join(", ")
    ))
}

impl From<&PredictionResult> for PredictionResponse {
    fn from(result: &PredictionResult) -> Self {
        Self {
            predicted_price: round_cents(result.price),
            currency: CURRENCY.to_string(),
            confidence_range: confidence_range(result.price),
            warning: missing_features_warning(&result.missing_features),
        }
    }
}
