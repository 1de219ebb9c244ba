//! Error types for the prediction library

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the learners (scaler and regressors)
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has not been fitted")]
    NotFitted,

    #[error("expected {expected} feature columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot fit on an empty matrix")]
    EmptyInput,

    #[error("feature matrix has {rows} rows but target has {targets} values")]
    LengthMismatch { rows: usize, targets: usize },

    #[error("linear system is singular")]
    Singular,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Failures while reading, writing or validating a model bundle
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to access model bundle at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model bundle: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported bundle format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid model bundle: {0}")]
    Invalid(String),
}

/// Request-level failure taxonomy for the prediction pipeline
///
/// Each variant maps to one HTTP status: `InvalidInput` to 400,
/// `PayloadTooLarge` to 413 and `Internal` to 500.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Request too large")]
    PayloadTooLarge,

    #[error("{0}")]
    Internal(String),
}

impl PredictError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::InvalidInput(_) => "invalid_input",
            PredictError::PayloadTooLarge => "payload_too_large",
            PredictError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            PredictError::InvalidInput(_) => 400,
            PredictError::PayloadTooLarge => 413,
            PredictError::Internal(_) => 500,
        }
    }
}

impl From<ModelError> for PredictError {
    fn from(err: ModelError) -> Self {
        PredictError::Internal(format!("Prediction failed: {}", err))
    }
}
