//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;

use crate::transport::TransportKind;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8081";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOGOUT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid DAYFLOW_API_BASE_URL '{0}': expected an http:// or https:// URL")]
    InvalidBaseUrl(String),
    #[error("unknown DAYFLOW_TOKEN_TRANSPORT '{0}' (expected 'bearer' or 'cookie')")]
    UnknownTransport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
    /// Upper bound on the best-effort backend logout call.
    pub logout_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            logout_secs: DEFAULT_LOGOUT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin without a trailing slash.
    pub base_url: String,
    pub transport: TransportKind,
    /// Where durable session state lives; `None` keeps it in memory.
    pub session_file: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Config for `base_url` with default transport and timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            transport: TransportKind::default(),
            session_file: None,
            timeouts: Timeouts::default(),
        })
    }

    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `DAYFLOW_API_BASE_URL`: default `http://127.0.0.1:8081`
    /// - `DAYFLOW_TOKEN_TRANSPORT`: `bearer` (default) or `cookie`
    /// - `DAYFLOW_SESSION_FILE`: path of the durable session file
    /// - `DAYFLOW_REQUEST_TIMEOUT_SECS`: default 30
    /// - `DAYFLOW_CONNECT_TIMEOUT_SECS`: default 10
    /// - `DAYFLOW_LOGOUT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or transport value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("DAYFLOW_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let transport = parse_transport(std::env::var("DAYFLOW_TOKEN_TRANSPORT").ok().as_deref())?;
        let session_file = std::env::var("DAYFLOW_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let timeouts = Timeouts {
            request_secs: env_parse_u64("DAYFLOW_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("DAYFLOW_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            logout_secs: env_parse_u64("DAYFLOW_LOGOUT_TIMEOUT_SECS", DEFAULT_LOGOUT_TIMEOUT_SECS),
        };

        Ok(Self { base_url: normalize_base_url(&base_url)?, transport, session_file, timeouts })
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Parse a transport name; `None` means the default.
///
/// # Errors
///
/// Returns an error for names other than `bearer` and `cookie`.
pub fn parse_transport(raw: Option<&str>) -> Result<TransportKind, ConfigError> {
    match raw {
        None => Ok(TransportKind::default()),
        Some(raw) => raw.parse().map_err(ConfigError::UnknownTransport),
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let has_host = ["http://", "https://"]
        .iter()
        .any(|scheme| trimmed.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()));
    if !has_host {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}
