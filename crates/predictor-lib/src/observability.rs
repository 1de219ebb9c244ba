//! Observability infrastructure for the price service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, request outcomes, defaulted features, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounterVec,
    missing_features_total: IntCounter,
    model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "price_api_prediction_latency_seconds",
                "Time spent reconciling features and running inference",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter!(
                "price_api_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "price_api_prediction_errors_total",
                "Total number of failed prediction requests by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            missing_features_total: register_int_counter!(
                "price_api_missing_features_total",
                "Total number of features defaulted because a request omitted them"
            )
            .expect("Failed to register missing_features_total"),

            model_info: register_gauge_vec!(
                "price_api_model_info",
                "Information about the loaded model bundle",
                &["algorithm", "target_transform"]
            )
            .expect("Failed to register model_info"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn add_missing_features(&self, count: usize) {
        self.inner().missing_features_total.inc_by(count as u64);
    }

    /// Replace the model info series with the loaded bundle's labels
    pub fn set_model_info(&self, algorithm: &str, target_transform: &str) {
        self.inner().model_info.reset();
        self.inner()
            .model_info
            .with_label_values(&[algorithm, target_transform])
            .set(1.0);
    }

    /// Render the default registry in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for service events
///
/// Every record carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, addr: &str, environment: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            addr = %addr,
            environment = %environment,
            "Price prediction service started"
        );
    }

    pub fn log_model_loaded(&self, path: &str, algorithm: &str, n_features: usize) {
        info!(
            event = "model_loaded",
            service = %self.service,
            path = %path,
            algorithm = %algorithm,
            n_features = n_features,
            "Model bundle loaded"
        );
    }

    pub fn log_prediction(&self, predicted_price: f64, missing_features: usize, latency_ms: f64) {
        info!(
            event = "prediction_served",
            service = %self.service,
            predicted_price = predicted_price,
            missing_features = missing_features,
            latency_ms = latency_ms,
            "Prediction served"
        );
    }

    pub fn log_prediction_failed(&self, kind: &str, status: u16, error: &str) {
        if status >= 500 {
            warn!(
                event = "prediction_failed",
                service = %self.service,
                kind = %kind,
                status = status,
                error = %error,
                "Prediction failed"
            );
        } else {
            info!(
                event = "prediction_rejected",
                service = %self.service,
                kind = %kind,
                status = status,
                error = %error,
                "Prediction request rejected"
            );
        }
    }

    pub fn log_training_complete(
        &self,
        algorithm: &str,
        n_train: usize,
        n_test: usize,
        mae: f64,
        rmse: f64,
        r2: f64,
    ) {
        info!(
            event = "training_completed",
            service = %self.service,
            algorithm = %algorithm,
            n_train = n_train,
            n_test = n_test,
            mae = mae,
            rmse = rmse,
            r2 = r2,
            "Model training completed"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Price prediction service shutting down"
        );
    }
}
