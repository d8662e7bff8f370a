//! Client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors produced while building a [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The base URL is not an `http://` or `https://` URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect_secs: u64,
    pub request_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn connect(self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub fn request(self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS, request_secs: DEFAULT_REQUEST_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP base URL of the session server, without a trailing slash.
    pub base_url: String,
    /// Credential presented on the socket upgrade and as a bearer token.
    pub token: Option<String>,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Build a config for `base_url` with default timeouts and no credential.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] unless the URL is `http(s)://`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self { base_url: normalize_base_url(base_url)?, token: None, timeouts: Timeouts::default() })
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CODEPAIR_BASE_URL`: default `http://localhost:8080`
    /// - `CODEPAIR_TOKEN`: credential, unset means anonymous
    /// - `CODEPAIR_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CODEPAIR_REQUEST_TIMEOUT_SECS`: default 30
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for a non-HTTP base URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("CODEPAIR_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let token = match std::env::var("CODEPAIR_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Some(token),
            _ => None,
        };
        let timeouts = Timeouts {
            connect_secs: env_parse_u64("CODEPAIR_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            request_secs: env_parse_u64("CODEPAIR_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self { base_url: normalize_base_url(&base_url)?, token, timeouts })
    }

    /// Return a copy with `token` set.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Credential to present, empty when anonymous.
    #[must_use]
    pub fn credential(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let has_host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    if !has_host {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
