//! Sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `META_ACCESS_TOKEN` - Graph API access token (HIGH PRIVILEGE)
//!
//! ## Optional
//! - `META_API_VERSION` - Graph API version (default: v21.0)
//! - `META_GRAPH_URL` - Graph API base URL (default: <https://graph.facebook.com>)
//! - `SYNC_MAX_CONCURRENT_ACCOUNTS` - Accounts fetched concurrently per batch (default: 5)
//! - `SYNC_INSIGHTS_BATCH_SIZE` - Sub-requests per batch call (default: 50, max 50)
//! - `SYNC_MAX_PAGES` - Page cap per paginated fetch (default: 100)
//! - `SYNC_PAGE_SIZE` - Items requested per page (default: 100)
//! - `SYNC_BATCH_DELAY_MS` - Pause between insight batches (default: 100)
//! - `CACHE_TTL_SECS` - Default cache entry lifetime (default: 300)
//! - `CACHE_MAX_CAPACITY` - Maximum cache entries (default: 1000)

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const ACCESS_TOKEN_VAR: &str = "META_ACCESS_TOKEN";
const DEFAULT_API_VERSION: &str = "v21.0";
const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";

/// Hard ceiling the platform puts on sub-requests per batch call.
pub const MAX_BATCH_SIZE: usize = 50;

/// Platform-issued tokens are far longer than this.
const MIN_ACCESS_TOKEN_LEN: usize = 32;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("META_ACCESS_TOKEN is not a usable access token: {0}")]
    InvalidAccessToken(&'static str),
}

/// Graph API connection configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct GraphApiConfig {
    /// Access token (HIGH PRIVILEGE - reads every granted ad account)
    pub access_token: SecretString,
    /// API version path segment (e.g., v21.0)
    pub api_version: String,
    /// Base URL without version (e.g., <https://graph.facebook.com>)
    pub graph_url: String,
}

impl std::fmt::Debug for GraphApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphApiConfig")
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("graph_url", &self.graph_url)
            .finish()
    }
}

impl GraphApiConfig {
    /// Load Graph API configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the token is missing or does not look like a
    /// platform-issued token (see [`validate_access_token`]).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            access_token: read_access_token()?,
            api_version: get_env_or_default("META_API_VERSION", DEFAULT_API_VERSION),
            graph_url: get_env_or_default("META_GRAPH_URL", DEFAULT_GRAPH_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Tunables for the sync pipeline.
///
/// Every limit is explicit: account fan-out, batch size, page cap and the
/// pause between insight batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Accounts fetched concurrently within one batch.
    pub max_concurrent_accounts: usize,
    /// Campaigns per batched insights call (at most [`MAX_BATCH_SIZE`]).
    pub insights_batch_size: usize,
    /// Page cap for one paginated fetch. Reaching it is a soft stop.
    pub max_pages: usize,
    /// Items requested per page.
    pub page_size: usize,
    /// Pause between successive insight batches.
    pub batch_delay: Duration,
    /// Default lifetime of cache entries.
    pub cache_ttl: Duration,
    /// Maximum number of cache entries.
    pub cache_max_capacity: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_concurrent_accounts: 5,
            insights_batch_size: MAX_BATCH_SIZE,
            max_pages: 100,
            page_size: 100,
            batch_delay: Duration::from_millis(100),
            cache_ttl: Duration::from_secs(300),
            cache_max_capacity: 1000,
        }
    }
}

impl SyncSettings {
    /// Load settings from environment variables, defaulting anything unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a variable is set but does not
    /// parse, or if a count is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let settings = Self {
            max_concurrent_accounts: parse_env(
                "SYNC_MAX_CONCURRENT_ACCOUNTS",
                defaults.max_concurrent_accounts,
            )?,
            insights_batch_size: parse_env("SYNC_INSIGHTS_BATCH_SIZE", defaults.insights_batch_size)?,
            max_pages: parse_env("SYNC_MAX_PAGES", defaults.max_pages)?,
            page_size: parse_env("SYNC_PAGE_SIZE", defaults.page_size)?,
            batch_delay: Duration::from_millis(parse_env("SYNC_BATCH_DELAY_MS", 100_u64)?),
            cache_ttl: Duration::from_secs(parse_env("CACHE_TTL_SECS", 300_u64)?),
            cache_max_capacity: parse_env("CACHE_MAX_CAPACITY", defaults.cache_max_capacity)?,
        };

        settings.validated()
    }

    /// Reject zero counts and clamp the batch size to the platform ceiling.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` naming the offending setting.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("SYNC_MAX_CONCURRENT_ACCOUNTS", self.max_concurrent_accounts),
            ("SYNC_INSIGHTS_BATCH_SIZE", self.insights_batch_size),
            ("SYNC_MAX_PAGES", self.max_pages),
            ("SYNC_PAGE_SIZE", self.page_size),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidEnvVar(
                    name.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }

        if self.insights_batch_size > MAX_BATCH_SIZE {
            tracing::warn!(
                requested = self.insights_batch_size,
                max = MAX_BATCH_SIZE,
                "Insights batch size above platform ceiling, clamping"
            );
            self.insights_batch_size = MAX_BATCH_SIZE;
        }

        Ok(self)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn read_access_token() -> Result<SecretString, ConfigError> {
    let raw = std::env::var(ACCESS_TOKEN_VAR)
        .map_err(|_| ConfigError::MissingEnvVar(ACCESS_TOKEN_VAR.to_string()))?;
    validate_access_token(&raw)
}

/// Check that `raw` has the shape of a Graph API access token.
///
/// Tokens are opaque: one unbroken run of letters, digits and `|_-` (app
/// tokens join id and secret with `|`) mixing upper case, lower case and
/// digits. Copied `.env` templates such as `your_access_token_here` fail
/// the mix check.
///
/// # Errors
///
/// Returns `ConfigError::InvalidAccessToken` naming the failed check.
pub fn validate_access_token(raw: &str) -> Result<SecretString, ConfigError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(ConfigError::InvalidAccessToken("value is empty"));
    }
    if token.len() < MIN_ACCESS_TOKEN_LEN {
        return Err(ConfigError::InvalidAccessToken("too short to be platform-issued"));
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '|' | '_' | '-'))
    {
        return Err(ConfigError::InvalidAccessToken(
            "contains characters tokens never use (spaces, quotes or brackets)",
        ));
    }

    let has_upper = token.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = token.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(ConfigError::InvalidAccessToken(
            "looks like a placeholder, paste the token issued by the platform",
        ));
    }

    Ok(SecretString::from(token.to_string()))
}
