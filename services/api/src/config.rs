//! API server configuration
//!
//! Values come from an optional `config/api.toml` file and are overridden by
//! `APP__*` environment variables (`APP__PORT=8080`, `APP__AR_API_KEY=...`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Key accepted in `X-API-Key` by the public AR data endpoints
    #[serde(default)]
    pub ar_api_key: Option<String>,
    /// Front-end base URL used for next-step hints
    pub client_url: String,
    /// Comma-separated CORS origins; falls back to `client_url`
    #[serde(default)]
    pub allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 5000)?
            .set_default("client_url", "http://localhost:3000")?
            .add_source(File::with_name("config/api").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether `provided` matches the configured AR API key
    ///
    /// Always false when no key is configured.
    pub fn api_key_matches(&self, provided: Option<&str>) -> bool {
        match (self.ar_api_key.as_deref(), provided) {
            (Some(expected), Some(provided)) => !expected.is_empty() && expected == provided,
            _ => false,
        }
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.allowed_origins
            .as_deref()
            .unwrap_or(&self.client_url)
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}
