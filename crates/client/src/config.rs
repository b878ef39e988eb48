//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional:
//! - `AGENT_MARKET_API_URL` - REST API base (default: `http://localhost:8000/api`)
//! - `AGENT_MARKET_MEDIA_URL` - Origin serving stored media (default: origin of the API URL)
//! - `AGENT_MARKET_SESSION_FILE` - Where the session cache is persisted
//!   (default: `<data dir>/agent-market/session.json`)
//! - `AGENT_MARKET_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `AGENT_MARKET_DETAIL_CACHE_TTL_SECS` - Agent detail cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default API base used for local development.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DETAIL_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid URL {0}: {1}")]
    InvalidUrl(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API base URL (endpoints are appended as path segments)
    pub api_url: Url,
    /// Origin used to resolve relative media references
    pub media_url: Url,
    /// File holding the persisted token and user snapshot
    pub session_file: PathBuf,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Time-to-live for cached agent detail responses
    pub detail_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Build a configuration for `api_url` with every other setting at its
    /// default.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `api_url` is not an http(s) URL.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        let api_url = parse_http_url("api_url", api_url)?;
        let media_url = origin_of(&api_url)?;

        Ok(Self {
            api_url,
            media_url,
            session_file: default_session_file(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            detail_cache_ttl: Duration::from_secs(DEFAULT_DETAIL_CACHE_TTL_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL does not parse or a number is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::new(&get_env_or_default("AGENT_MARKET_API_URL", DEFAULT_API_URL))?;

        if let Some(media) = get_optional_env("AGENT_MARKET_MEDIA_URL") {
            config.media_url = parse_http_url("AGENT_MARKET_MEDIA_URL", &media)?;
        }
        if let Some(path) = get_optional_env("AGENT_MARKET_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        config.http_timeout = Duration::from_secs(get_env_u64(
            "AGENT_MARKET_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        config.detail_cache_ttl = Duration::from_secs(get_env_u64(
            "AGENT_MARKET_DETAIL_CACHE_TTL_SECS",
            DEFAULT_DETAIL_CACHE_TTL_SECS,
        )?);
        config.sentry_dsn = get_optional_env("SENTRY_DSN");
        config.sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(config)
    }

    /// Replace the session file location.
    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Replace the media origin.
    #[must_use]
    pub fn with_media_url(mut self, media_url: Url) -> Self {
        self.media_url = media_url;
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Get a numeric environment variable with a default value.
fn get_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a URL and require an http or https scheme.
fn parse_http_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(
            name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Reduce a URL to its origin (`scheme://host[:port]`).
fn origin_of(url: &Url) -> Result<Url, ConfigError> {
    let origin = url.origin().ascii_serialization();
    Url::parse(&origin).map_err(|e| ConfigError::InvalidUrl(origin, e.to_string()))
}

/// Default session file under the platform data directory.
fn default_session_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agent-market")
        .join("session.json")
}
