//! Standard scaling: `z = (x - mean) / std`

use super::{check_width, Transformer};
use crate::error::ModelError;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column centering and scaling learned from training data
///
/// Uses the population standard deviation. Constant columns get a scale of
/// 1 so they are centered but never divided by zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<(), ModelError> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ModelError::EmptyInput);
        }
        let n = x.nrows() as f64;

        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let mu = column.sum() / n;
            let var = column.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            mean.push(mu);
            scale.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        self.mean = mean;
        self.scale = scale;
        Ok(())
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_width(self.n_features(), x)?;

        let mut out = x.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (mu, s) = (self.mean[j], self.scale[j]);
            column.mapv_inplace(|v| (v - mu) / s);
        }
        Ok(out)
    }

    fn n_features(&self) -> Option<usize> {
        (!self.mean.is_empty()).then_some(self.mean.len())
    }
}
