//! Model bundle: the artifact handed from the trainer to the predictor
//!
//! A bundle is a JSON document holding the fitted scaler and regressor, the
//! ordered feature schema they were fitted on, and the transform that was
//! applied to the target. The predictor loads it once at startup and treats
//! it as immutable for the lifetime of the process; any inconsistency is
//! reported at load time so the service never starts with a broken model.

use crate::error::BundleError;
use crate::estimator::{Regressor, RegressorModel, StandardScaler, Transformer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Schema version written by this build and the only one it loads
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Transform applied to the regression target before fitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetTransform {
    /// `ln(1 + y)`, inverted with `exp(x) - 1`
    Log1p,
}

impl TargetTransform {
    pub fn apply(&self, y: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y.ln_1p(),
        }
    }

    pub fn invert(&self, y: f64) -> f64 {
        match self {
            TargetTransform::Log1p => y.exp_m1(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TargetTransform::Log1p => "log1p",
        }
    }
}

/// Held-out evaluation recorded by the trainer, in original price units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_test: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationMetrics>,
}

impl Default for BundleMetadata {
    fn default() -> Self {
        Self {
            trained_at: Utc::now(),
            n_train: 0,
            n_test: 0,
            evaluation: None,
        }
    }
}

/// Fitted scaler + regressor with the feature schema they share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    format_version: u32,
    feature_names: Vec<String>,
    target_transform: TargetTransform,
    scaler: StandardScaler,
    regressor: RegressorModel,
    #[serde(default)]
    metadata: BundleMetadata,
}

impl ModelBundle {
    /// Assemble a bundle from fitted parts, checking that they agree
    pub fn new(
        feature_names: Vec<String>,
        target_transform: TargetTransform,
        scaler: StandardScaler,
        regressor: RegressorModel,
        metadata: BundleMetadata,
    ) -> Result<Self, BundleError> {
        let bundle = Self {
            format_version: BUNDLE_FORMAT_VERSION,
            feature_names,
            target_transform,
            scaler,
            regressor,
            metadata,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Read and validate a bundle from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: ModelBundle = serde_json::from_reader(BufReader::new(file))?;
        bundle.validate()?;

        info!(
            path = %path.display(),
            algorithm = bundle.regressor.algorithm(),
            n_features = bundle.feature_names.len(),
            target_transform = bundle.target_transform.name(),
            "Model bundle loaded"
        );
        Ok(bundle)
    }

    /// Write the bundle as JSON, replacing any existing file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BundleError> {
        let path = path.as_ref();
        let io_err = |source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(io_err)?;

        debug!(path = %path.display(), "Model bundle written");
        Ok(())
    }

    fn validate(&self) -> Result<(), BundleError> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(BundleError::UnsupportedVersion {
                found: self.format_version,
                supported: BUNDLE_FORMAT_VERSION,
            });
        }

        if self.feature_names.is_empty() {
            return Err(BundleError::Invalid("feature_names is empty".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.feature_names.iter().find(|n| !seen.insert(n.as_str())) {
            return Err(BundleError::Invalid(format!(
                "duplicate feature name '{}'",
                dup
            )));
        }

        let width = self.feature_names.len();
        match self.scaler.n_features() {
            Some(n) if n == width => {}
            Some(n) => {
                return Err(BundleError::Invalid(format!(
                    "scaler was fitted on {} columns but bundle lists {} features",
                    n, width
                )))
            }
            None => return Err(BundleError::Invalid("scaler is not fitted".to_string())),
        }
        if self.scaler.scale().len() != width
            || self
                .scaler
                .mean()
                .iter()
                .chain(self.scaler.scale())
                .any(|v| !v.is_finite())
        {
            return Err(BundleError::Invalid(
                "scaler parameters are malformed".to_string(),
            ));
        }

        match self.regressor.n_features() {
            Some(n) if n == width => {}
            Some(n) => {
                return Err(BundleError::Invalid(format!(
                    "regressor was fitted on {} columns but bundle lists {} features",
                    n, width
                )))
            }
            None => {
                return Err(BundleError::Invalid(
                    "regressor is not fitted".to_string(),
                ))
            }
        }
        if let RegressorModel::RandomForest(forest) = &self.regressor {
            if !forest.is_consistent() {
                return Err(BundleError::Invalid(
                    "random forest trees are malformed".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_transform(&self) -> TargetTransform {
        self.target_transform
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn regressor(&self) -> &RegressorModel {
        &self.regressor
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn format_version(&self) -> u32 {
        self.format_version
    }
}
