//! Application configuration module
//!
//! Configuration for the messaging core. Values come from the builder, from a
//! TOML file, or from defaults. Every path ends in [`AppConfigBuilder::build`],
//! which validates the result.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default maximum message length, in characters
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;
/// Default send timeout in seconds
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 15;
/// Default preview length for conversation summaries
pub const DEFAULT_PREVIEW_LENGTH: usize = 80;
/// Default lifetime of a typing indicator in seconds
pub const DEFAULT_TYPING_EXPIRY_SECS: u64 = 5;
/// Default pause between offline queue replays while connected
pub const DEFAULT_QUEUE_RETRY_SECS: u64 = 30;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Server URL
    pub server_url: Option<String>,
    /// Longest accepted message body, counted in characters
    pub max_message_length: usize,
    /// Upper bound on a single send request
    pub send_timeout: Duration,
    /// Length of the last-message preview in conversation summaries
    pub preview_length: usize,
    /// SQLite file backing the offline queue (None = platform data dir)
    pub queue_db_path: Option<PathBuf>,
    /// How long a typing indicator stays visible without a refresh
    pub typing_expiry: Duration,
    /// Interval at which queued sends are replayed while the network is up
    pub queue_retry_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
            preview_length: DEFAULT_PREVIEW_LENGTH,
            queue_db_path: None,
            typing_expiry: Duration::from_secs(DEFAULT_TYPING_EXPIRY_SECS),
            queue_retry_interval: Duration::from_secs(DEFAULT_QUEUE_RETRY_SECS),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document into a validated configuration
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Load and validate a TOML configuration file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.max_message_length == 0 {
            return Err(ConfigError::InvalidValue("max_message_length must be positive"));
        }
        if self.send_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("send_timeout must be positive"));
        }
        if self.queue_retry_interval.is_zero() {
            return Err(ConfigError::InvalidValue("queue_retry_interval must be positive"));
        }
        if self.preview_length < 4 {
            return Err(ConfigError::InvalidValue("preview_length must be at least 4"));
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    max_message_length: Option<usize>,
    send_timeout: Option<Duration>,
    preview_length: Option<usize>,
    queue_db_path: Option<PathBuf>,
    typing_expiry: Option<Duration>,
    queue_retry_interval: Option<Duration>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = Some(max);
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    pub fn preview_length(mut self, len: usize) -> Self {
        self.preview_length = Some(len);
        self
    }

    pub fn queue_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_db_path = Some(path.into());
        self
    }

    pub fn typing_expiry(mut self, expiry: Duration) -> Self {
        self.typing_expiry = Some(expiry);
        self
    }

    pub fn queue_retry_interval(mut self, interval: Duration) -> Self {
        self.queue_retry_interval = Some(interval);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let config = AppConfig {
            server_url: self.server_url,
            max_message_length: self.max_message_length.unwrap_or(defaults.max_message_length),
            send_timeout: self.send_timeout.unwrap_or(defaults.send_timeout),
            preview_length: self.preview_length.unwrap_or(defaults.preview_length),
            queue_db_path: self.queue_db_path,
            typing_expiry: self.typing_expiry.unwrap_or(defaults.typing_expiry),
            queue_retry_interval: self
                .queue_retry_interval
                .unwrap_or(defaults.queue_retry_interval),
        };
        config.validate()?;
        Ok(config)
    }
}

/// On-disk shape of the TOML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server_url: Option<String>,
    max_message_length: Option<usize>,
    send_timeout_secs: Option<u64>,
    preview_length: Option<usize>,
    queue_db_path: Option<PathBuf>,
    typing_expiry_secs: Option<u64>,
    queue_retry_secs: Option<u64>,
}

impl ConfigFile {
    fn into_builder(self) -> AppConfigBuilder {
        let mut builder = AppConfig::builder();
        if let Some(url) = self.server_url {
            builder = builder.server_url(url);
        }
        if let Some(max) = self.max_message_length {
            builder = builder.max_message_length(max);
        }
        if let Some(secs) = self.send_timeout_secs {
            builder = builder.send_timeout(Duration::from_secs(secs));
        }
        if let Some(len) = self.preview_length {
            builder = builder.preview_length(len);
        }
        if let Some(path) = self.queue_db_path {
            builder = builder.queue_db_path(path);
        }
        if let Some(secs) = self.typing_expiry_secs {
            builder = builder.typing_expiry(Duration::from_secs(secs));
        }
        if let Some(secs) = self.queue_retry_secs {
            builder = builder.queue_retry_interval(Duration::from_secs(secs));
        }
        builder
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to read configuration: {0}")]
    Io(String),
}
