//! L2-regularized linear regression solved in closed form

use super::{check_training_input, check_width, Regressor};
use crate::error::ModelError;
use ndarray::{Array1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

const PIVOT_EPSILON: f64 = 1e-12;

/// Ridge regression with an unpenalized intercept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegressor {
    alpha: f64,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl RidgeRegressor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Regressor for RidgeRegressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        if !(self.alpha >= 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "alpha must be non-negative, got {}",
                self.alpha
            )));
        }

        let x_mean = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyInput)?;
        let y = Array1::from(y.to_vec());
        let y_mean = y.sum() / y.len() as f64;

        let xc = &x - &x_mean;
        let yc = y.mapv(|v| v - y_mean);

        // (Xc^T Xc + alpha I) w = Xc^T yc
        let mut gram = xc.t().dot(&xc);
        for i in 0..gram.nrows() {
            gram[[i, i]] += self.alpha;
        }
        let rhs = xc.t().dot(&yc);

        let a: Vec<Vec<f64>> = gram.outer_iter().map(|r| r.to_vec()).collect();
        let coefficients = solve(a, rhs.to_vec())?;

        self.intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(w, m)| w * m)
                .sum::<f64>();
        self.coefficients = coefficients;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features(), x)?;
        let w = Array1::from(self.coefficients.clone());
        Ok(x.dot(&w).mapv(|v| v + self.intercept).to_vec())
    }

    fn n_features(&self) -> Option<usize> {
        (!self.coefficients.is_empty()).then_some(self.coefficients.len())
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ModelError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(ModelError::Singular)?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ModelError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}
