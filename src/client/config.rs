use std::path::PathBuf;

use crate::client::local_db::LocalDatabase;
use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Client configuration: validated [`AppConfig`] plus session credentials.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
    token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut builder = AppConfig::builder();
        if let Ok(url) = std::env::var("CLIENT_API_URL") {
            builder = builder.server_url(url);
        }
        // An invalid CLIENT_API_URL falls back to the built-in default
        let app = builder.build().unwrap_or_else(|e| {
            tracing::warn!("[CONFIG] Ignoring environment configuration: {}", e);
            AppConfig::default()
        });
        Self {
            app,
            token: std::env::var("ORANGECAT_TOKEN").ok(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self::from_app(builder.build()?))
    }

    pub fn from_app(app: AppConfig) -> Self {
        Self {
            app,
            token: std::env::var("ORANGECAT_TOKEN").ok(),
        }
    }

    /// Load from a TOML file; `CLIENT_API_URL` still wins over the file
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut app = AppConfig::load_from_file(path.into())?;
        if let Ok(url) = std::env::var("CLIENT_API_URL") {
            app.server_url = Some(url.trim_end_matches('/').to_string());
            app.validate()?;
        }
        Ok(Self::from_app(app))
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Use this bearer token instead of `ORANGECAT_TOKEN`
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Get the bearer token
    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Where the offline queue lives on disk
    pub fn queue_db_path(&self) -> PathBuf {
        self.app
            .queue_db_path
            .clone()
            .unwrap_or_else(LocalDatabase::default_path)
    }
}
