//! HTTP API: service info, health, prediction and Prometheus metrics

use crate::config::ServiceConfig;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use predictor_lib::{
    observability::{ServiceMetrics, StructuredLogger},
    predictor::{parse_payload, Predictor},
    PredictError, PredictionResponse,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info};

pub const SERVICE_NAME: &str = "House Price Prediction API";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
///
/// The predictor is loaded once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<dyn Predictor>,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
    pub environment: String,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>, environment: impl Into<String>) -> Self {
        let metrics = ServiceMetrics::new();
        metrics.set_model_info(predictor.algorithm(), predictor.target_transform());
        Self {
            predictor,
            metrics,
            logger: StructuredLogger::new("price-api"),
            environment: environment.into(),
        }
    }
}

/// `PredictError` rendered as a JSON `{"error"}` body with its status
pub struct ApiError(PredictError);

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn home() -> impl IntoResponse {
    Json(json!({
        "message": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "endpoints": {
            "GET /": "API information",
            "GET /health": "Check API health",
            "POST /predict": "Make house price prediction",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.environment,
    }))
}

/// Body extraction failures are folded into the error taxonomy: an
/// over-limit body is `PayloadTooLarge`, anything else is unreadable input
fn read_body(body: Result<Bytes, BytesRejection>) -> Result<Bytes, PredictError> {
    body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            PredictError::PayloadTooLarge
        } else {
            PredictError::InvalidInput(rejection.body_text())
        }
    })
}

async fn predict(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let start = Instant::now();

    let outcome = read_body(body)
        .and_then(|bytes| parse_payload(&bytes))
        .and_then(|input| state.predictor.predict(&input));

    let result = match outcome {
        Ok(result) => result,
        Err(err) => {
            state.metrics.inc_prediction_errors(err.kind());
            state
                .logger
                .log_prediction_failed(err.kind(), err.status_code(), &err.to_string());
            return Err(err.into());
        }
    };

    let response = PredictionResponse::from(&result);
    let elapsed = start.elapsed();

    state.metrics.observe_prediction_latency(elapsed.as_secs_f64());
    state.metrics.inc_predictions();
    state.metrics.add_missing_features(result.missing_features.len());
    state.logger.log_prediction(
        response.predicted_price,
        result.missing_features.len(),
        elapsed.as_secs_f64() * 1000.0,
    );

    Ok(Json(response))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            ApiError(PredictError::Internal("Failed to encode metrics".to_string())).into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

fn cors_layer(config: &ServiceConfig) -> Result<CorsLayer> {
    let origins = config.cors_origin_list();
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() || origins.contains(&"*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .into_iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin '{}'", o)))
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>, config: &ServiceConfig) -> Result<Router> {
    Ok(Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.max_request_bytes))
        .layer(cors_layer(config)?)
        .with_state(state))
}

/// Start the API server and run until ctrl-c
pub async fn serve(config: &ServiceConfig, state: Arc<AppState>) -> Result<()> {
    let app = create_router(state, config)?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
