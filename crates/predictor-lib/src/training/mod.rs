//! Offline training: CSV dataset to model bundle

mod dataset;
mod engineering;
mod metrics;
mod split;
mod trainer;

pub use dataset::{Column, Dataset};
pub use engineering::{add_engineered_features, FEATURE_COLUMNS, TARGET_COLUMN};
pub use metrics::{evaluate, mae, r2, rmse};
pub use split::train_test_split;
pub use trainer::{Algorithm, Trainer, TrainingConfig, TrainingOutcome};
