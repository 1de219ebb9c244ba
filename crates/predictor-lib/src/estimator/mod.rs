//! Learners behind the prediction pipeline
//!
//! The pipeline only depends on two capabilities: a [`Transformer`] that
//! rescales a feature matrix and a [`Regressor`] that maps rows to a scalar.
//! Concrete algorithms are stored in a bundle through [`RegressorModel`],
//! which tags each variant so a bundle records which algorithm produced it.

mod forest;
mod ridge;
mod scaler;

pub use forest::{ForestParams, RandomForestRegressor, RegressionTree};
pub use ridge::RidgeRegressor;
pub use scaler::StandardScaler;

use crate::error::ModelError;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// A model that learns a mapping from feature rows to a scalar target
pub trait Regressor: Send + Sync {
    /// Fit the model on `x` (rows are samples) against `y`
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) -> Result<(), ModelError>;

    /// Predict one value per row of `x`
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, ModelError>;

    /// Number of feature columns the model was fitted on, `None` before fitting
    fn n_features(&self) -> Option<usize>;
}

/// A fitted column-wise transformation applied before the regressor
pub trait Transformer: Send + Sync {
    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<(), ModelError>;

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError>;

    fn n_features(&self) -> Option<usize>;

    fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Serializable union of the regressors a bundle can carry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RegressorModel {
    RandomForest(RandomForestRegressor),
    Ridge(RidgeRegressor),
}

impl RegressorModel {
    pub fn algorithm(&self) -> &'static str {
        match self {
            RegressorModel::RandomForest(_) => "random_forest",
            RegressorModel::Ridge(_) => "ridge",
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            RegressorModel::RandomForest(m) => m,
            RegressorModel::Ridge(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            RegressorModel::RandomForest(m) => m,
            RegressorModel::Ridge(m) => m,
        }
    }
}

impl Regressor for RegressorModel {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) -> Result<(), ModelError> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, ModelError> {
        self.inner().predict(x)
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }
}

/// Shared input checks for `fit`
fn check_training_input(x: ArrayView2<'_, f64>, y: &[f64]) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::EmptyInput);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.nrows(),
            targets: y.len(),
        });
    }
    Ok(())
}

/// Shared width check for `predict`/`transform`
fn check_width(fitted: Option<usize>, x: ArrayView2<'_, f64>) -> Result<(), ModelError> {
    let expected = fitted.ok_or(ModelError::NotFitted)?;
    if x.ncols() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor_model_tagged_serialization() {
        let mut model = RegressorModel::Ridge(RidgeRegressor::new(0.1));
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = [2.0, 5.0, 6.0, 9.0];
        model.fit(x.view(), &y).unwrap();

        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["algorithm"], "ridge");

        let restored: RegressorModel = serde_json::from_value(json).unwrap();
        assert_eq!(restored.algorithm(), "ridge");
        assert_eq!(restored.n_features(), Some(2));
        let before = model.predict(x.view()).unwrap();
        let after = restored.predict(x.view()).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let json = r#"{"algorithm": "gradient_boosting"}"#;
        assert!(serde_json::from_str::<RegressorModel>(json).is_err());
    }

    #[test]
    fn test_check_width() {
        let x = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            check_width(None, x.view()),
            Err(ModelError::NotFitted)
        ));
        assert!(matches!(
            check_width(Some(2), x.view()),
            Err(ModelError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(check_width(Some(3), x.view()).is_ok());
    }
}
