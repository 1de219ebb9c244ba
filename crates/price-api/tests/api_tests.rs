//! Integration tests for the price API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use predictor_lib::{
    estimator::ForestParams,
    training::{Dataset, Trainer, TrainingConfig},
    PredictError, PredictionResult, Predictor, PricePredictor,
};
use price_api::{
    api::{create_router, AppState},
    config::ServiceConfig,
};
use serde_json::{json, Map, Value};
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

/// Ames-shaped rows with a price driven by quality and living area
fn training_csv() -> String {
    let mut csv = String::from(
        "Overall Qual,Gr Liv Area,Total Bsmt SF,1st Flr SF,2nd Flr SF,Full Bath,Half Bath,\
Bsmt Full Bath,Bsmt Half Bath,Year Built,Year Remod/Add,Yr Sold,Garage Cars,Garage Area,SalePrice\n",
    );
    for i in 0..60 {
        let qual = 4 + i % 6;
        let area = 1000 + (i * 53) % 1500;
        let bsmt = 500 + (i * 17) % 800;
        let price = 30_000 + qual * 20_000 + area * 50 + bsmt * 15;
        writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            qual,
            area,
            bsmt,
            area / 2,
            area / 2,
            1 + i % 2,
            i % 2,
            i % 3 / 2,
            0,
            1960 + i % 45,
            1970 + i % 40,
            2009,
            1 + i % 3,
            250 + (i * 7) % 400,
            price
        )
        .unwrap();
    }
    csv
}

/// Forest predictions stay inside the training target range, so defaulted
/// features still yield a plausible positive price
fn predictor() -> Arc<dyn Predictor> {
    static PREDICTOR: OnceLock<Arc<PricePredictor>> = OnceLock::new();
    PREDICTOR
        .get_or_init(|| {
            let config = TrainingConfig {
                forest: ForestParams {
                    n_estimators: 8,
                    ..ForestParams::default()
                },
                ..TrainingConfig::default()
            };
            let dataset = Dataset::from_reader(training_csv().as_bytes()).unwrap();
            let outcome = Trainer::new(config).train(dataset).unwrap();
            Arc::new(PricePredictor::new(outcome.bundle))
        })
        .clone()
}

/// Always fails inside the pipeline
struct FailingPredictor {
    names: Vec<String>,
}

impl Predictor for FailingPredictor {
    fn predict(&self, _input: &Map<String, Value>) -> Result<PredictionResult, PredictError> {
        Err(PredictError::Internal("Model produced a non-finite prediction".to_string()))
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn algorithm(&self) -> &str {
        "failing"
    }

    fn target_transform(&self) -> &str {
        "log1p"
    }
}

fn app_with(predictor: Arc<dyn Predictor>, config: &ServiceConfig) -> Router {
    let state = Arc::new(AppState::new(predictor, config.environment.clone()));
    create_router(state, config).unwrap()
}

fn setup_test_app() -> Router {
    app_with(predictor(), &ServiceConfig::default())
}

fn post_predict(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn full_sample() -> Value {
    json!({
        "Overall Qual": 7,
        "Gr Liv Area": 1710,
        "Total Bsmt SF": 856,
        "1st Flr SF": 856,
        "Full Bath": 2,
        "Year Built": 2003,
        "Year Remod/Add": 2003,
        "Garage Cars": 2,
        "Garage Area": 548,
        "Total SF": 2566,
        "House Age": 14,
        "Years Since Remodel": 14,
        "Total Bathrooms": 2.5,
        "Has Garage": 1,
        "Has Basement": 1
    })
}

#[tokio::test]
async fn test_home_lists_endpoints() {
    let response = setup_test_app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["message"], "House Price Prediction API");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["endpoints"]["POST /predict"].is_string());
}

#[tokio::test]
async fn test_health_returns_ok() {
    let config = ServiceConfig {
        environment: "test".to_string(),
        ..ServiceConfig::default()
    };
    let response = app_with(predictor(), &config)
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "test");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_predict_full_sample() {
    let response = setup_test_app()
        .oneshot(post_predict(full_sample().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["currency"], "USD");
    assert!(body.get("warning").is_none());
    let price = body["predicted_price"].as_f64().unwrap();
    assert!(price > 0.0);
}

#[tokio::test]
async fn test_predict_partial_input_warns() {
    let input = json!({"Overall Qual": 7, "Gr Liv Area": 1710, "Total Bsmt SF": 856});
    let response = setup_test_app()
        .oneshot(post_predict(input.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let price = body["predicted_price"].as_f64().unwrap();
    let lower = body["confidence_range"]["lower"].as_f64().unwrap();
    let upper = body["confidence_range"]["upper"].as_f64().unwrap();
    assert!(price > 0.0);
    assert!(upper > price && price > lower);

    assert_eq!(
        body["warning"],
        "Some features were missing and set to default: ['1st Flr SF', 'Full Bath', \
         'Year Built', 'Year Remod/Add', 'Garage Cars', 'Garage Area', 'Total SF', \
         'House Age', 'Years Since Remodel', 'Total Bathrooms', 'Has Garage', 'Has Basement']"
    );
}

#[tokio::test]
async fn test_predict_is_idempotent() {
    let app = setup_test_app();
    let first = json_body(
        app.clone()
            .oneshot(post_predict(full_sample().to_string()))
            .await
            .unwrap(),
    )
    .await;
    let second = json_body(app.oneshot(post_predict(full_sample().to_string())).await.unwrap()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_predict_ignores_extra_keys() {
    let mut input = full_sample();
    input["Pool QC"] = json!("Ex");
    let with_extra = json_body(
        setup_test_app()
            .oneshot(post_predict(input.to_string()))
            .await
            .unwrap(),
    )
    .await;
    let without = json_body(
        setup_test_app()
            .oneshot(post_predict(full_sample().to_string()))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(with_extra, without);
}

#[tokio::test]
async fn test_predict_without_body() {
    let response = setup_test_app()
        .oneshot(post_predict(Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "No data provided"}));
}

#[tokio::test]
async fn test_predict_empty_object() {
    let response = setup_test_app().oneshot(post_predict("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No data provided");
}

#[tokio::test]
async fn test_predict_invalid_json() {
    let response = setup_test_app()
        .oneshot(post_predict("Overall Qual=7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_predict_non_numeric_feature() {
    let response = setup_test_app()
        .oneshot(post_predict(r#"{"Overall Qual": "seven"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("Overall Qual"));
}

#[tokio::test]
async fn test_predict_oversized_body() {
    let config = ServiceConfig {
        max_request_bytes: 64,
        ..ServiceConfig::default()
    };
    let response = app_with(predictor(), &config)
        .oneshot(post_predict(full_sample().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await, json!({"error": "Request too large"}));
}

#[tokio::test]
async fn test_predict_internal_error() {
    let failing = Arc::new(FailingPredictor {
        names: vec!["Overall Qual".to_string()],
    });
    let response = app_with(failing, &ServiceConfig::default())
        .oneshot(post_predict(full_sample().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await["error"],
        "Model produced a non-finite prediction"
    );
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let response = setup_test_app().oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"error": "Not found"}));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup_test_app();
    app.clone()
        .oneshot(post_predict(full_sample().to_string()))
        .await
        .unwrap();

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("price_api_predictions_total"));
    assert!(text.contains("price_api_prediction_latency_seconds"));
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://frontend.example")
        .body(Body::empty())
        .unwrap();
    let response = setup_test_app().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let config = ServiceConfig {
        cors_origins: "https://frontend.example".to_string(),
        ..ServiceConfig::default()
    };
    let app = app_with(predictor(), &config);

    let allowed = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://frontend.example")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://frontend.example"
    );

    let other = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(other).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_bundle_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("house_price_model.json");
    let dataset = Dataset::from_reader(training_csv().as_bytes()).unwrap();
    let config = TrainingConfig {
        forest: ForestParams {
            n_estimators: 4,
            ..ForestParams::default()
        },
        ..TrainingConfig::default()
    };
    Trainer::new(config)
        .train(dataset)
        .unwrap()
        .bundle
        .save(&path)
        .unwrap();

    let loaded = PricePredictor::from_path(&path).unwrap();
    let response = app_with(Arc::new(loaded), &ServiceConfig::default())
        .oneshot(post_predict(full_sample().to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(PricePredictor::from_path(dir.path().join("missing.json")).is_err());
}
