//! Runtime configuration sourced from the environment.

use std::path::PathBuf;

use spamguard_dispatch::{DEFAULT_API_URL, is_https, is_loopback, validate_base_url};
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Base URL of the service.
pub const API_URL_VAR: &str = "API_URL";
/// Root directory of the durable session store.
pub const SESSION_DIR_VAR: &str = "SPAMGUARD_SESSION_DIR";
/// Log filter directive.
pub const LOG_FILTER_VAR: &str = "SPAMGUARD_LOG";
/// Directory for per-run log files.
pub const LOG_DIR_VAR: &str = "SPAMGUARD_LOG_DIR";

/// Log filter used when [`LOG_FILTER_VAR`] is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

const APP_DIR_NAME: &str = "spamguard";

/// Application configuration, built once by the entry point and passed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Validated service base URL.
    pub api_url: Url,
    /// Root of the durable session store.
    pub session_dir: PathBuf,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Per-run log file directory; stderr only when absent.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    /// See [`AppConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidApiUrl`] for an unusable base URL and
    /// [`ConfigError::NoDataDir`] when no session directory is configured and
    /// the platform has no data-local directory.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let raw_url = read(API_URL_VAR).unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&raw_url)?;

        let session_dir = match read(SESSION_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(ConfigError::NoDataDir)?,
        };

        Ok(Self {
            api_url,
            session_dir,
            log_filter: read(LOG_FILTER_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_dir: read(LOG_DIR_VAR).map(PathBuf::from),
        })
    }

    /// Replaces the base URL, e.g. from a command-line override.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidApiUrl`] for an unusable URL.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_api_url(raw)?;
        Ok(self)
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = validate_base_url(raw).map_err(|error| ConfigError::InvalidApiUrl {
        value: raw.to_string(),
        reason: error.to_string(),
    })?;

    if !is_https(&url) && !is_loopback(&url) {
        warn!(stage = "config", action = "insecure_api_url", host = url.host_str().unwrap_or_default(), "credentials will travel over plain http");
    }
    Ok(url)
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The base URL is not an absolute http(s) URL.
    #[error("invalid API_URL {value:?}: {reason}")]
    InvalidApiUrl {
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// No session directory could be determined.
    #[error("no data directory available; set SPAMGUARD_SESSION_DIR")]
    NoDataDir,
}
