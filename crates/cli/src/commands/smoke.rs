//! End-to-end smoke test against a running service

use anyhow::{bail, Result};
use colored::Colorize;
use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::output::{format_currency, print_error, print_success};

/// A complete 15-feature house used for the prediction check
pub fn sample_house() -> Value {
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

/// Run the health, home and prediction checks; fails if any check failed
pub async fn run(client: &ApiClient) -> Result<()> {
    println!("{}", "Testing House Price Prediction API".bold());
    println!("{}", "=".repeat(40));
    let mut failures = 0;

    println!("1. Testing health endpoint...");
    match client.health().await {
        Ok(health) => {
            let environment = health.environment.as_deref().unwrap_or("unknown");
            print_success(&format!(
                "Health check passed ({}, environment {})",
                health.status, environment
            ));
        }
        Err(e) => {
            print_error(&format!("Health check failed: {:#}", e));
            failures += 1;
        }
    }

    println!("2. Testing home endpoint...");
    match client.home().await {
        Ok(home) => {
            print_success("Home endpoint working");
            println!("  Message: {} (version {})", home.message, home.version);
            for (endpoint, description) in &home.endpoints {
                println!("  {:<16} {}", endpoint, description.dimmed());
            }
        }
        Err(e) => {
            print_error(&format!("Home endpoint failed: {:#}", e));
            failures += 1;
        }
    }

    println!("3. Testing prediction endpoint...");
    match client.predict(&sample_house()).await {
        Ok(prediction) => {
            print_success("Prediction successful");
            println!(
                "  Predicted Price: {}",
                format_currency(prediction.predicted_price, &prediction.currency)
            );
        }
        Err(e) => {
            print_error(&format!("Prediction failed: {:#}", e));
            failures += 1;
        }
    }

    println!();
    if failures > 0 {
        bail!("{} of 3 checks failed", failures);
    }
    println!("{}", "API testing completed!".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn mock_service(server: &mut mockito::Server, predict_status: usize) -> Vec<mockito::Mock> {
        let health = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"healthy"}"#)
            .create_async()
            .await;
        let home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"House Price Prediction API","version":"1.0.0"}"#)
            .create_async()
            .await;
        let body = if predict_status == 200 {
            r#"{"predicted_price":200000.0,"currency":"USD","confidence_range":{"lower":180000.0,"upper":220000.0}}"#
        } else {
            r#"{"error":"Model produced a non-finite prediction"}"#
        };
        let predict = server
            .mock("POST", "/predict")
            .with_status(predict_status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
        vec![health, home, predict]
    }

    #[test]
    fn test_sample_house_has_all_features() {
        let sample = sample_house();
        let map = sample.as_object().unwrap();
        assert_eq!(map.len(), 15);
        for name in predictor_lib::training::FEATURE_COLUMNS {
            assert!(map.contains_key(name), "sample is missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_all_checks_pass() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_service(&mut server, 200).await;
        let client = ApiClient::new(&server.url()).unwrap();
        assert!(run(&client).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_check_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_service(&mut server, 500).await;
        let client = ApiClient::new(&server.url()).unwrap();
        let err = run(&client).await.unwrap_err();
        assert!(err.to_string().contains("1 of 3"));
    }
}
