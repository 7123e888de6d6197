//! Configuration module for the log emitter.
//!
//! This module holds the emitter configuration, its validation rules, and an
//! environment-based loader for processes that configure the emitter from
//! their environment.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default ingestion endpoint
pub const DEFAULT_INGEST_URL: &str = "https://logs.logdna.com/logs/ingest";

/// Default number of buffered lines that triggers an automatic flush
pub const DEFAULT_BUFFER_SIZE: usize = 100;

const ENV_APP: &str = "LOG_EMITTER_APP";
const ENV_API_KEY: &str = "LOG_EMITTER_API_KEY";
const ENV_HOSTNAME: &str = "LOG_EMITTER_HOSTNAME";
const ENV_MAC: &str = "LOG_EMITTER_MAC";
const ENV_IP: &str = "LOG_EMITTER_IP";
const ENV_TAGS: &str = "LOG_EMITTER_TAGS";
const ENV_BUFFER_SIZE: &str = "LOG_EMITTER_BUFFER_SIZE";
const ENV_INGEST_URL: &str = "LOG_EMITTER_INGEST_URL";
const ENV_REQUEST_TIMEOUT_SECS: &str = "LOG_EMITTER_REQUEST_TIMEOUT_SECS";

/// Configuration for an [`Emitter`](crate::emitter::Emitter).
///
/// `app`, `api_key` and `hostname` are required. Everything else is optional.
///
/// All settings can be loaded from environment variables with
/// [`EmitterConfig::from_env`]:
/// - `LOG_EMITTER_APP`: default application name for lines
/// - `LOG_EMITTER_API_KEY`: ingestion key
/// - `LOG_EMITTER_HOSTNAME`: host identifier
/// - `LOG_EMITTER_MAC`, `LOG_EMITTER_IP`: optional host addresses
/// - `LOG_EMITTER_TAGS`: comma separated tags
/// - `LOG_EMITTER_BUFFER_SIZE`: flush threshold (default: 100)
/// - `LOG_EMITTER_INGEST_URL`: ingestion endpoint
/// - `LOG_EMITTER_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: none)
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Application name assigned to lines that don't carry one
    pub app: String,

    /// Ingestion key sent with every request
    pub api_key: String,

    /// Identifier of the host producing the lines
    pub hostname: String,

    /// MAC address of the host
    pub mac: String,

    /// IP address of the host
    pub ip: String,

    /// Tags attached to every request
    pub tags: Vec<String>,

    /// Number of buffered lines that triggers a flush; 0 selects the default
    pub buffer_size: usize,

    /// Ingestion endpoint the request query is appended to
    pub ingest_url: String,

    /// HTTP request timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("app is required")]
    AppRequired,

    #[error("API key is required")]
    ApiKeyRequired,

    #[error("hostname is required")]
    HostnameRequired,

    #[error("invalid ingest URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Configuration error for {env_var}: {message}")]
    InvalidValue { env_var: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl EmitterConfig {
    /// Create a configuration with the required fields and defaults for the rest.
    pub fn new(
        app: impl Into<String>,
        api_key: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            api_key: api_key.into(),
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Missing variables fall back to the defaults. Required fields are not
    /// checked here; [`EmitterConfig::validate`] does that when an emitter is
    /// built.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `LOG_EMITTER_BUFFER_SIZE` is not a valid number
    /// - `LOG_EMITTER_REQUEST_TIMEOUT_SECS` is not a valid number or is zero
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use log_emitter::config::EmitterConfig;
    ///
    /// let config = EmitterConfig::from_env().expect("Failed to load config");
    /// println!("Ingest URL: {}", config.ingest_url);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let tags = env::var(ENV_TAGS)
            .map(|value| parse_tags(&value))
            .unwrap_or_default();

        let ingest_url = env::var(ENV_INGEST_URL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INGEST_URL.to_string());

        Ok(Self {
            app: env::var(ENV_APP).unwrap_or_default(),
            api_key: env::var(ENV_API_KEY).unwrap_or_default(),
            hostname: env::var(ENV_HOSTNAME).unwrap_or_default(),
            mac: env::var(ENV_MAC).unwrap_or_default(),
            ip: env::var(ENV_IP).unwrap_or_default(),
            tags,
            buffer_size: Self::parse_buffer_size()?,
            ingest_url,
            request_timeout: Self::parse_request_timeout()?,
        })
    }

    /// Check that every required field is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.is_empty() {
            return Err(ConfigError::AppRequired);
        }
        if self.api_key.is_empty() {
            return Err(ConfigError::ApiKeyRequired);
        }
        if self.hostname.is_empty() {
            return Err(ConfigError::HostnameRequired);
        }
        Ok(())
    }

    /// The flush threshold with the default applied.
    pub fn effective_buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size
        }
    }

    fn parse_buffer_size() -> Result<usize, ConfigError> {
        match env::var(ENV_BUFFER_SIZE) {
            Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                env_var: ENV_BUFFER_SIZE.to_string(),
                message: format!("'{}' is not a valid number", value),
            }),
            Err(_) => Ok(0),
        }
    }

    fn parse_request_timeout() -> Result<Option<Duration>, ConfigError> {
        let value = match env::var(ENV_REQUEST_TIMEOUT_SECS) {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };

        let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            env_var: ENV_REQUEST_TIMEOUT_SECS.to_string(),
            message: format!("'{}' is not a valid number", value),
        })?;

        if secs == 0 {
            return Err(ConfigError::InvalidValue {
                env_var: ENV_REQUEST_TIMEOUT_SECS.to_string(),
                message: "request timeout must be greater than 0".to_string(),
            });
        }

        Ok(Some(Duration::from_secs(secs)))
    }
}

impl Default for EmitterConfig {
    /// Defaults for every field. The required fields are left empty.
    fn default() -> Self {
        Self {
            app: String::new(),
            api_key: String::new(),
            hostname: String::new(),
            mac: String::new(),
            ip: String::new(),
            tags: Vec::new(),
            buffer_size: 0,
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            request_timeout: None,
        }
    }
}

fn parse_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
