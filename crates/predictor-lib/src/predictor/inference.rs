//! Scaling and inference against a loaded model bundle

use super::features::reconcile;
use super::output::{confidence_range, round_cents};
use super::Predictor;
use crate::bundle::ModelBundle;
use crate::error::{BundleError, PredictError};
use crate::estimator::{Regressor, Transformer};
use crate::models::{FeatureVector, PredictionResult};
use ndarray::ArrayView2;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 50;

/// Predictor backed by an immutable [`ModelBundle`]
///
/// Holds no per-request state, so one instance can be shared by every
/// request handler without locking.
pub struct PricePredictor {
    bundle: ModelBundle,
}

impl PricePredictor {
    pub fn new(bundle: ModelBundle) -> Self {
        Self { bundle }
    }

    /// Load the bundle at `path`; any failure is returned to the caller,
    /// which is expected to abort startup
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        Ok(Self::new(ModelBundle::load(path)?))
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Scale the reconciled row, run the regressor and undo the target
    /// transform
    pub fn estimate(&self, features: &FeatureVector) -> Result<f64, PredictError> {
        let start = Instant::now();

        let row = ArrayView2::from_shape((1, features.values.len()), &features.values)
            .map_err(|e| PredictError::Internal(format!("Invalid feature row: {}", e)))?;
        let scaled = self.bundle.scaler().transform(row)?;
        let output = self.bundle.regressor().predict(scaled.view())?;
        let raw = output
            .first()
            .copied()
            .ok_or_else(|| PredictError::Internal("Model returned no prediction".to_string()))?;

        let price = self.bundle.target_transform().invert(raw);
        if !price.is_finite() {
            return Err(PredictError::Internal(
                "Model produced a non-finite prediction".to_string(),
            ));
        }
        let band = confidence_range(price);
        if !(round_cents(price).is_finite() && band.lower.is_finite() && band.upper.is_finite()) {
            return Err(PredictError::Internal(
                "Model prediction is out of representable range".to_string(),
            ));
        }

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), raw, price, "Inference completed");
        }

        Ok(price)
    }
}

impl Predictor for PricePredictor {
    fn predict(&self, input: &Map<String, Value>) -> Result<PredictionResult, PredictError> {
        let features = reconcile(input, self.bundle.feature_names())?;
        let price = self.estimate(&features)?;
        Ok(PredictionResult {
            price,
            missing_features: features.missing,
        })
    }

    fn feature_names(&self) -> &[String] {
        self.bundle.feature_names()
    }

    fn algorithm(&self) -> &str {
        self.bundle.regressor().algorithm()
    }

    fn target_transform(&self) -> &str {
        self.bundle.target_transform().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleMetadata, TargetTransform};
    use crate::estimator::{RegressorModel, RidgeRegressor, StandardScaler};
    use ndarray::array;
    use serde_json::json;

    /// Ridge model fitted so that log-price = 11 + 0.5 * z(size)
    fn ridge_predictor() -> PricePredictor {
        let x = array![[1000.0, 1.0], [1500.0, 2.0], [2000.0, 1.0], [2500.0, 2.0]];
        let mut scaler = StandardScaler::new();
        let xs = scaler.fit_transform(x.view()).unwrap();
        let y: Vec<f64> = xs.outer_iter().map(|r| 11.0 + 0.5 * r[0]).collect();
        let mut ridge = RidgeRegressor::new(0.0);
        ridge.fit(xs.view(), &y).unwrap();

        let bundle = ModelBundle::new(
            vec!["Gr Liv Area".to_string(), "Full Bath".to_string()],
            TargetTransform::Log1p,
            scaler,
            RegressorModel::Ridge(ridge),
            BundleMetadata::default(),
        )
        .unwrap();
        PricePredictor::new(bundle)
    }

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_prediction_inverts_log_target() {
        let predictor = ridge_predictor();
        // mean size -> z = 0 -> log-price 11
        let result = predictor
            .predict(&object(json!({"Gr Liv Area": 1750, "Full Bath": 1.5})))
            .unwrap();
        assert!((result.price - 11.0_f64.exp_m1()).abs() < 1e-6);
        assert!(result.missing_features.is_empty());
    }

    #[test]
    fn test_missing_features_reported() {
        let predictor = ridge_predictor();
        let result = predictor.predict(&object(json!({"Gr Liv Area": 2000}))).unwrap();
        assert_eq!(result.missing_features, vec!["Full Bath".to_string()]);
        assert!(result.price > 0.0);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let predictor = ridge_predictor();
        let input = object(json!({"Gr Liv Area": 1234, "Bedroom": 3}));
        let a = predictor.predict(&input).unwrap();
        let b = predictor.predict(&input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_overflow_is_internal_error() {
        let predictor = ridge_predictor();
        let err = predictor
            .predict(&object(json!({"Gr Liv Area": 1e300})))
            .unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
    }

    #[test]
    fn test_price_too_large_to_round_is_internal_error() {
        let predictor = ridge_predictor();
        // z = 1395 -> log-price 708.5: finite price, but cents and band overflow
        let std = 312_500.0_f64.sqrt();
        let input = object(json!({"Gr Liv Area": 1750.0 + 1395.0 * std, "Full Bath": 1.5}));
        let err = predictor.predict(&input).unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
    }

    #[test]
    fn test_wrong_width_row_is_internal_error() {
        let predictor = ridge_predictor();
        let err = predictor
            .estimate(&FeatureVector {
                values: vec![1.0, 2.0, 3.0],
                missing: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
    }

    #[test]
    fn test_metadata_accessors() {
        let predictor = ridge_predictor();
        assert_eq!(predictor.algorithm(), "ridge");
        assert_eq!(predictor.target_transform(), "log1p");
        assert_eq!(predictor.feature_names().len(), 2);
    }
}
