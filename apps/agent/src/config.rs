use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_DASHBOARD_URL: &str = "http://localhost:3000";

/// Agent configuration loaded from environment variables.
/// Every variable has a default except the token, which stays optional.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub dashboard_url: String,
    pub token: Option<String>,
    pub http_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let http_timeout_secs = std::env::var("APPLYEASE_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("APPLYEASE_HTTP_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Config {
            api_base: optional_env("APPLYEASE_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            dashboard_url: optional_env("APPLYEASE_DASHBOARD_URL")
                .unwrap_or_else(|| DEFAULT_DASHBOARD_URL.to_string()),
            token: optional_env("APPLYEASE_TOKEN"),
            http_timeout: Duration::from_secs(http_timeout_secs),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
