//! Feature reconciliation
//!
//! Turns an untrusted JSON request body into a numeric row in the exact
//! column order the scaler and regressor were fitted on. Absent features
//! are defaulted to zero and reported; unknown keys are dropped. Values are
//! coerced to numbers but never range-checked.

use crate::error::PredictError;
use crate::models::FeatureVector;
use serde_json::{Map, Value};

/// Error message for a missing or empty request body
pub const NO_DATA_MESSAGE: &str = "No data provided";

/// Value substituted for features the request does not mention
pub const DEFAULT_FEATURE_VALUE: f64 = 0.0;

/// Parse a raw request body into a feature mapping.
///
/// Empty input and "empty" JSON values (`{}`, `[]`, `null`, `""`, `0`,
/// `false`) are all treated as no data.
pub fn parse_payload(body: &[u8]) -> Result<Map<String, Value>, PredictError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(PredictError::InvalidInput(NO_DATA_MESSAGE.to_string()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| PredictError::InvalidInput(format!("Invalid JSON body: {}", e)))?;

    match value {
        Value::Object(map) if !map.is_empty() => Ok(map),
        v if is_empty_value(&v) => Err(PredictError::InvalidInput(NO_DATA_MESSAGE.to_string())),
        _ => Err(PredictError::InvalidInput(
            "Request body must be a JSON object mapping feature names to values".to_string(),
        )),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Align `input` to `feature_names`
pub fn reconcile(
    input: &Map<String, Value>,
    feature_names: &[String],
) -> Result<FeatureVector, PredictError> {
    let mut values = Vec::with_capacity(feature_names.len());
    let mut missing = Vec::new();

    for name in feature_names {
        match input.get(name) {
            Some(value) => values.push(coerce(name, value)?),
            None => {
                values.push(DEFAULT_FEATURE_VALUE);
                missing.push(name.clone());
            }
        }
    }

    Ok(FeatureVector { values, missing })
}

fn coerce(name: &str, value: &Value) -> Result<f64, PredictError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    match number {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(PredictError::InvalidInput(format!(
            "Feature '{}' must be numeric, got {}",
            name, value
        ))),
    }
}
