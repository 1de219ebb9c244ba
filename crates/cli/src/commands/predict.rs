//! Single prediction request against a running service

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use serde_json::{Map, Number, Value};
use std::path::Path;

use crate::client::ApiClient;
use crate::output::{format_currency, print_info, print_warning, OutputFormat};

/// Parse `Name=value`; numeric values become JSON numbers, anything else
/// is sent as a string for the service to judge
fn parse_feature(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Feature '{}' must be written as Name=value", raw))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Feature '{}' has an empty name", raw);
    }
    let value = value.trim();
    let value = value
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

/// Build the request body from an optional JSON file overlaid with
/// command-line features
pub fn build_payload(file: Option<&Path>, features: &[String]) -> Result<Map<String, Value>> {
    let mut payload = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str::<Value>(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
            {
                Value::Object(map) => map,
                _ => bail!("{} must contain a JSON object", path.display()),
            }
        }
        None => Map::new(),
    };

    for raw in features {
        let (name, value) = parse_feature(raw)?;
        payload.insert(name, value);
    }

    if payload.is_empty() {
        bail!("No features given; use --file or --feature");
    }
    Ok(payload)
}

/// Send one prediction and print the result
pub async fn run(
    client: &ApiClient,
    file: Option<&Path>,
    features: &[String],
    format: OutputFormat,
) -> Result<()> {
    let payload = build_payload(file, features)?;
    let result = client.predict(&payload).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Table => {
            println!("{}", "Price Prediction".bold());
            println!("{}", "=".repeat(40));
            println!(
                "Predicted price:  {}",
                format_currency(result.predicted_price, &result.currency)
                    .green()
                    .bold()
            );
            println!(
                "Range:            {} - {}",
                format_currency(result.confidence_range.lower, &result.currency),
                format_currency(result.confidence_range.upper, &result.currency)
            );
            println!();
            match &result.warning {
                Some(warning) => print_warning(warning),
                None => print_info("All model features were provided"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_feature() {
        let (name, value) = parse_feature("Overall Qual=7").unwrap();
        assert_eq!(name, "Overall Qual");
        assert_eq!(value, Value::from(7.0));

        let (name, value) = parse_feature(" Year Remod/Add = 2003 ").unwrap();
        assert_eq!(name, "Year Remod/Add");
        assert_eq!(value, Value::from(2003.0));

        let (_, value) = parse_feature("Overall Qual=seven").unwrap();
        assert_eq!(value, Value::from("seven"));

        assert!(parse_feature("Overall Qual").is_err());
        assert!(parse_feature("=7").is_err());
    }

    #[test]
    fn test_build_payload_overlays_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Overall Qual": 5, "Gr Liv Area": 1500}}"#).unwrap();

        let payload =
            build_payload(Some(file.path()), &["Overall Qual=8".to_string()]).unwrap();
        assert_eq!(payload["Overall Qual"], Value::from(8.0));
        assert_eq!(payload["Gr Liv Area"], Value::from(1500));
    }

    #[test]
    fn test_build_payload_errors() {
        assert!(build_payload(None, &[]).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(build_payload(Some(file.path()), &[]).is_err());
        assert!(build_payload(Some(Path::new("/nonexistent/house.json")), &[]).is_err());
    }

    #[tokio::test]
    async fn test_run_sends_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"Gr Liv Area": 1710.0})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"predicted_price":150000.0,"currency":"USD",
                   "confidence_range":{"lower":135000.0,"upper":165000.0},
                   "warning":"Some features were missing and set to default: ['Full Bath']"}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        run(&client, None, &["Gr Liv Area=1710".to_string()], OutputFormat::Table)
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
