//! HTTP DTOs for the execution, session and auth endpoints.
//!
//! DESIGN
//! ======
//! These mirror the server's JSON bodies field for field so serde stays
//! lossless. Socket frames live in the `frames` crate instead.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

pub use frames::{Language, Participant};

/// Body of `POST /execute`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub code: String,
    pub language: Language,
}

/// Reply of `POST /execute`, also used for locally synthesized failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the program ran to completion without error.
    pub success: bool,
    /// Captured standard output.
    #[serde(default)]
    pub output: String,
    /// Error text, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock run time in milliseconds.
    #[serde(rename = "executionTime", default, deserialize_with = "deserialize_millis")]
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    /// The result recorded when the execution call itself failed.
    #[must_use]
    pub fn fault(message: impl Into<String>) -> Self {
        Self { success: false, output: String::new(), error: Some(message.into()), execution_time_ms: 0 }
    }
}

/// Body of `POST /sessions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub language: Language,
}

/// Reply of `POST /sessions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Body of `POST /login` and `POST /register`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Reply of `POST /login` and `POST /register`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
}

/// Accept integer or finite non-negative float milliseconds, rounding floats.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_u64() {
                return Ok(int);
            }
            if let Some(float) = number.as_f64()
                && float.is_finite()
                && float >= 0.0
                && float <= u64::MAX as f64
            {
                return Ok(float.round() as u64);
            }
            Err(D::Error::custom("expected non-negative millisecond count"))
        }
        serde_json::Value::Null => Ok(0),
        _ => Err(D::Error::custom("expected number")),
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
