//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Prefix of the environment variables read by [`ServiceConfig::load`]
pub const ENV_PREFIX: &str = "PRICE_API";

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port; `PORT` is used when the prefixed variable is unset
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    /// Comma-separated allowed origins, `*` for any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    /// Log filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Model bundle written by the trainer
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Deployment name reported by the health endpoint
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_request_bytes() -> usize {
    16 * 1024
}

fn default_cors_origins() -> String {
    "*".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_model_path() -> String {
    "house_price_model.json".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_bytes: default_max_request_bytes(),
            cors_origins: default_cors_origins(),
            log_level: default_log_level(),
            model_path: default_model_path(),
            environment: default_environment(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of environment variables
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let vars: config::Map<String, String> = vars.into_iter().collect();

        let mut builder = config::Config::builder();
        if let Some(port) = vars.get("PORT") {
            builder = builder
                .set_default("port", port.as_str())
                .context("Invalid PORT")?;
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }

    /// Address to bind, `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Allowed CORS origins; empty entries are skipped
    pub fn cors_origin_list(&self) -> Vec<&str> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .collect()
    }
}
