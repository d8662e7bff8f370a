//! HTTP collaborators: code execution, session creation and auth.
//!
//! The coordinator only sees the [`Executor`] seam, so tests can swap in a
//! scripted executor without a server.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::types::{
    AuthRequest, AuthResponse, CreateSessionRequest, CreateSessionResponse, ExecuteRequest, ExecutionResult,
};
use crate::config::ClientConfig;
use frames::Language;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build http client: {0}")]
    ClientBuild(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("server returned an empty session id")]
    EmptySessionId,
}

// =============================================================================
// SEAMS
// =============================================================================

/// Runs a snapshot of code somewhere and reports the outcome.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Execute `request` and return the server's result.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] if the call fails or the server rejects it.
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecutionResult, ApiError>;
}

/// Creates new sessions before anyone joins them.
#[async_trait::async_trait]
pub trait SessionAdmission: Send + Sync {
    /// Create a session in `language` and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EmptySessionId`] when the server hands back no id.
    async fn create_session(&self, language: Language) -> Result<String, ApiError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    /// Build a client sharing `config`'s base URL, credential and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] if the TLS backend fails to initialize.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone(), token: config.token.clone() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-2xx reply.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = AuthRequest { username: username.to_owned(), password: password.to_owned() };
        let auth: AuthResponse = self.post_json("/login", &body).await?;
        info!(user_id = %auth.user_id, "api: logged in");
        Ok(auth)
    }

    /// Create an account and return its token.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport failure or a non-2xx reply.
    pub async fn register(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = AuthRequest { username: username.to_owned(), password: password.to_owned() };
        let auth: AuthResponse = self.post_json("/register", &body).await?;
        info!(user_id = %auth.user_id, "api: registered");
        Ok(auth)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.post(&url).json(body);
        if let Some(token) = self.token.as_deref() {
            request = request.bearer_auth(token);
        }

        let started = std::time::Instant::now();
        let response = request.send().await?;
        let status = response.status();
        debug!(%url, status = status.as_u16(), elapsed_ms = elapsed_ms(started.elapsed()), "api: response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<R>().await?)
    }
}

#[async_trait::async_trait]
impl Executor for HttpApi {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ExecutionResult, ApiError> {
        self.post_json("/execute", request).await
    }
}

#[async_trait::async_trait]
impl SessionAdmission for HttpApi {
    async fn create_session(&self, language: Language) -> Result<String, ApiError> {
        let created: CreateSessionResponse = self.post_json("/sessions", &CreateSessionRequest { language }).await?;
        if created.session_id.trim().is_empty() {
            return Err(ApiError::EmptySessionId);
        }
        info!(session_id = %created.session_id, %language, "api: session created");
        Ok(created.session_id)
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
