//! Core library for house price prediction
//!
//! This crate provides the core functionality for:
//! - The model bundle shared by the trainer and the prediction service
//! - Learners (standard scaler, random forest, ridge regression)
//! - Feature reconciliation and the prediction pipeline
//! - The offline training pipeline
//! - Metrics and structured logging

pub mod bundle;
pub mod error;
pub mod estimator;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use bundle::{BundleMetadata, EvaluationMetrics, ModelBundle, TargetTransform};
pub use error::{BundleError, ModelError, PredictError};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{PricePredictor, Predictor};
