//! Offline training pipeline
//!
//! Load the CSV, clean it, derive the engineered features, fit the scaler
//! and regressor on `log1p(SalePrice)`, evaluate on a held-out split and
//! assemble a [`ModelBundle`].

use super::dataset::Dataset;
use super::engineering::{add_engineered_features, FEATURE_COLUMNS, TARGET_COLUMN};
use super::metrics::evaluate;
use super::split::train_test_split;
use crate::bundle::{BundleMetadata, EvaluationMetrics, ModelBundle, TargetTransform};
use crate::estimator::{
    ForestParams, RandomForestRegressor, Regressor, RegressorModel, RidgeRegressor,
    StandardScaler, Transformer,
};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use ndarray::{Array2, Axis};
use std::path::Path;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RandomForest,
    Ridge,
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub algorithm: Algorithm,
    pub forest: ForestParams,
    pub ridge_alpha: f64,
    pub test_size: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::RandomForest,
            forest: ForestParams::default(),
            ridge_alpha: 1.0,
            test_size: 0.2,
            seed: 42,
        }
    }
}

/// Fitted bundle plus what happened to the data on the way
#[derive(Debug)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub evaluation: EvaluationMetrics,
    pub rows_dropped: usize,
    pub cells_imputed: usize,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn train_from_path(&self, path: impl AsRef<Path>) -> Result<TrainingOutcome> {
        let dataset = Dataset::from_path(path)?;
        self.train(dataset)
    }

    pub fn train(&self, mut dataset: Dataset) -> Result<TrainingOutcome> {
        let start = Instant::now();
        if dataset.n_rows() == 0 {
            bail!("Dataset is empty");
        }

        let rows_dropped = dataset
            .drop_missing(TARGET_COLUMN)
            .context("Dataset has no target column")?;
        if dataset.n_rows() == 0 {
            bail!("No rows with a {} value", TARGET_COLUMN);
        }
        let cells_imputed = dataset.impute();
        add_engineered_features(&mut dataset).context("Failed to derive engineered features")?;

        let x = feature_matrix(&dataset)?;
        let transform = TargetTransform::Log1p;
        let y: Vec<f64> = dataset
            .numeric(TARGET_COLUMN)?
            .into_iter()
            .map(|v| transform.apply(v))
            .collect();
        if let Some(row) = y.iter().position(|v| !v.is_finite()) {
            bail!("{} at row {} cannot be log-transformed", TARGET_COLUMN, row);
        }

        let (train_idx, test_idx) =
            train_test_split(x.nrows(), self.config.test_size, self.config.seed)?;
        let x_train = x.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| transform.invert(y[i])).collect();

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(x_train.view())?;
        let x_test = scaler.transform(x_test.view())?;

        let mut regressor = self.regressor();
        regressor
            .fit(x_train.view(), &y_train)
            .with_context(|| format!("Failed to fit {} model", regressor.algorithm()))?;

        let predicted: Vec<f64> = regressor
            .predict(x_test.view())?
            .into_iter()
            .map(|v| transform.invert(v))
            .collect();
        let evaluation = evaluate(&y_test, &predicted);

        let metadata = BundleMetadata {
            trained_at: Utc::now(),
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            evaluation: Some(evaluation.clone()),
        };
        let bundle = ModelBundle::new(
            FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            transform,
            scaler,
            regressor,
            metadata,
        )?;

        info!(
            algorithm = bundle.regressor().algorithm(),
            n_train = train_idx.len(),
            n_test = test_idx.len(),
            rows_dropped,
            cells_imputed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );

        Ok(TrainingOutcome {
            bundle,
            evaluation,
            rows_dropped,
            cells_imputed,
        })
    }

    fn regressor(&self) -> RegressorModel {
        match self.config.algorithm {
            Algorithm::RandomForest => RegressorModel::RandomForest(RandomForestRegressor::new(
                ForestParams {
                    seed: self.config.seed,
                    ..self.config.forest.clone()
                },
            )),
            Algorithm::Ridge => RegressorModel::Ridge(RidgeRegressor::new(self.config.ridge_alpha)),
        }
    }
}

fn feature_matrix(dataset: &Dataset) -> Result<Array2<f64>> {
    let n_rows = dataset.n_rows();
    let mut x = Array2::zeros((n_rows, FEATURE_COLUMNS.len()));
    for (j, name) in FEATURE_COLUMNS.iter().enumerate() {
        let values = dataset.numeric(name)?;
        x.column_mut(j)
            .iter_mut()
            .zip(values)
            .for_each(|(cell, v)| *cell = v);
    }
    Ok(x)
}
