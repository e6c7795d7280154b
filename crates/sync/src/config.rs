//! Sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COMMERCE_BASE_URL` - Origin of the commerce backend (e.g., `https://shop.example.com`)
//!
//! ## Optional
//! - `COMMERCE_STORE_CODE` - Store view code sent with login requests (default: `default`)
//! - `COMMERCE_GRAPHQL_PATH` - GraphQL endpoint path (default: `/graphql`)
//! - `COMMERCE_SECTION_TIMEOUT_SECS` - Section load timeout (default: 10)
//! - `COMMERCE_LOGIN_TIMEOUT_SECS` - Login timeout (default: 6)
//! - `COMMERCE_GRAPHQL_TIMEOUT_SECS` - GraphQL request timeout (default: 15)
//! - `COMMERCE_DRIFT_DELAY_MS` - Delay before deferred drift resolution (default: 3000)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_SECTION_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 6;
const DEFAULT_GRAPHQL_TIMEOUT_SECS: u64 = 15;
const DEFAULT_DRIFT_DELAY_MS: u64 = 3000;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Connection and timing configuration for the commerce backend.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Origin of the commerce backend
    pub base_url: Url,
    /// Store view code sent in the `Store` header
    pub store_code: String,
    /// Path of the GraphQL endpoint
    pub graphql_path: String,
    /// Abort timeout for section loads
    pub section_timeout: Duration,
    /// Abort timeout for login requests
    pub login_timeout: Duration,
    /// Abort timeout for GraphQL cart operations
    pub graphql_timeout: Duration,
    /// Default delay before a deferred drift resolution runs
    pub drift_delay: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl SyncConfig {
    /// Build a configuration with default timings for the given backend.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            store_code: "default".to_string(),
            graphql_path: "/graphql".to_string(),
            section_timeout: Duration::from_secs(DEFAULT_SECTION_TIMEOUT_SECS),
            login_timeout: Duration::from_secs(DEFAULT_LOGIN_TIMEOUT_SECS),
            graphql_timeout: Duration::from_secs(DEFAULT_GRAPHQL_TIMEOUT_SECS),
            drift_delay: Duration::from_millis(DEFAULT_DRIFT_DELAY_MS),
            sentry_dsn: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let base_url = Url::parse(&get_required_env("COMMERCE_BASE_URL")?).map_err(|e| {
            ConfigError::InvalidEnvVar("COMMERCE_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            base_url,
            store_code: get_env_or_default("COMMERCE_STORE_CODE", "default"),
            graphql_path: get_env_or_default("COMMERCE_GRAPHQL_PATH", "/graphql"),
            section_timeout: Duration::from_secs(get_parsed_env(
                "COMMERCE_SECTION_TIMEOUT_SECS",
                DEFAULT_SECTION_TIMEOUT_SECS,
            )?),
            login_timeout: Duration::from_secs(get_parsed_env(
                "COMMERCE_LOGIN_TIMEOUT_SECS",
                DEFAULT_LOGIN_TIMEOUT_SECS,
            )?),
            graphql_timeout: Duration::from_secs(get_parsed_env(
                "COMMERCE_GRAPHQL_TIMEOUT_SECS",
                DEFAULT_GRAPHQL_TIMEOUT_SECS,
            )?),
            drift_delay: Duration::from_millis(get_parsed_env(
                "COMMERCE_DRIFT_DELAY_MS",
                DEFAULT_DRIFT_DELAY_MS,
            )?),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
        })
    }

    /// URL of the section-load endpoint (query string is added per request).
    #[must_use]
    pub fn section_load_url(&self) -> Url {
        self.endpoint("/customer/section/load/")
    }

    /// URL of the AJAX login endpoint.
    #[must_use]
    pub fn login_url(&self) -> Url {
        self.endpoint("/customer/ajax/login/")
    }

    /// URL of the GraphQL endpoint.
    #[must_use]
    pub fn graphql_url(&self) -> Url {
        self.endpoint(&self.graphql_path)
    }

    /// Cookies are only marked `Secure` when the backend is served over HTTPS.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.scheme() != "http"
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a numeric environment variable, falling back to `default` when unset.
fn get_parsed_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    get_optional_env(key).map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
