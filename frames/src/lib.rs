//! Shared frame model and JSON codec for the realtime session socket.
//!
//! This crate owns the wire representation used by the session client and
//! any peer that speaks to it. Every message is one JSON object carrying a
//! string `type`; the remaining fields are the payload for that type, laid out
//! beside the tag. Each `type` maps to exactly one enum variant with a fixed
//! payload shape, so payload fields can never shadow the tag.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error returned by [`decode_frame`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("failed to parse frame json: {0}")]
    Json(#[from] serde_json::Error),
    /// The JSON value is valid but is not an object.
    #[error("frame is not a json object")]
    NotAnObject,
    /// The object has no string `type` field.
    #[error("frame has no string `type` field")]
    MissingType,
    /// The `type` is not one this side of the protocol understands.
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    /// The `type` is known but its payload does not match the declared shape.
    #[error("invalid payload for frame type {kind}: {source}")]
    Payload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A language identifier outside the supported set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language: {0}")]
pub struct UnsupportedLanguage(pub String);

// =============================================================================
// LANGUAGE
// =============================================================================

/// Languages a session can be switched to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// `javascript`
    #[default]
    JavaScript,
    /// `python`
    Python,
    /// `go`
    Go,
}

impl Language {
    /// Every supported language, in selector order.
    pub const ALL: [Self; 3] = [Self::JavaScript, Self::Python, Self::Go];

    /// Wire identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
        }
    }

    /// Human-readable name for selectors.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript",
            Self::Python => "Python",
            Self::Go => "Go",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnsupportedLanguage(raw.to_owned()))
    }
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// One connected user as announced by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Identifier, unique within the session.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display color (hex).
    pub color: String,
    /// Set by the server when this entry describes the receiving client.
    #[serde(default)]
    pub is_current_user: bool,
    /// Presence flag; absent on the wire means online.
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

// =============================================================================
// FRAMES
// =============================================================================

/// Frame kinds with a closed set of `type` tags.
pub trait Tagged {
    /// Every `type` tag this frame kind decodes, aliases included.
    const TYPES: &'static [&'static str];

    /// Canonical `type` tag of this frame.
    fn type_name(&self) -> &'static str;
}

/// Frames sent by the server (or relayed from peers) to a session client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Admission to the session confirmed.
    Connected {
        #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    /// One participant arrived.
    UserJoined(Participant),
    /// One participant went away.
    UserLeft { id: String },
    /// Full, order-significant roster replacement.
    UsersUpdated { users: Vec<Participant> },
    /// Room-wide language switch. Peers relay it under the client tag.
    #[serde(alias = "language-change")]
    LanguageChanged { language: Language },
    /// Whole-text replacement from a peer.
    CodeUpdate { code: String },
}

impl Tagged for ServerFrame {
    const TYPES: &'static [&'static str] = &[
        "connected",
        "user-joined",
        "user-left",
        "users-updated",
        "language-changed",
        "language-change",
        "code-update",
    ];

    fn type_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::UsersUpdated { .. } => "users-updated",
            Self::LanguageChanged { .. } => "language-changed",
            Self::CodeUpdate { .. } => "code-update",
        }
    }
}

/// Frames a session client sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Replace the shared code text.
    CodeUpdate { code: String },
    /// Switch the room language.
    LanguageChange { language: Language },
}

impl Tagged for ClientFrame {
    const TYPES: &'static [&'static str] = &["code-update", "language-change"];

    fn type_name(&self) -> &'static str {
        match self {
            Self::CodeUpdate { .. } => "code-update",
            Self::LanguageChange { .. } => "language-change",
        }
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a frame as one JSON text message.
#[must_use]
pub fn encode_frame<F: Serialize>(frame: &F) -> String {
    // Frame enums only hold strings, bools and string-keyed structs, so
    // serialization cannot fail; the fallback is never taken.
    serde_json::to_string(frame).unwrap_or_default()
}

/// Decode one JSON text message into a frame of kind `F`.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for unparseable text, [`CodecError::NotAnObject`]
/// and [`CodecError::MissingType`] for structurally wrong frames,
/// [`CodecError::UnknownType`] for tags outside `F::TYPES`, and
/// [`CodecError::Payload`] when the payload does not fit the tag.
pub fn decode_frame<F>(text: &str) -> Result<F, CodecError>
where
    F: Tagged + DeserializeOwned,
{
    let value: Value = serde_json::from_str(text)?;
    let Some(object) = value.as_object() else {
        return Err(CodecError::NotAnObject);
    };
    let Some(kind) = object.get("type").and_then(Value::as_str) else {
        return Err(CodecError::MissingType);
    };
    let kind = kind.to_owned();
    if !F::TYPES.contains(&kind.as_str()) {
        return Err(CodecError::UnknownType(kind));
    }
    let value = lift_data_envelope(value);
    serde_json::from_value(value).map_err(|source| CodecError::Payload { kind, source })
}

/// Turn `{type, data: {..}}` into `{type, ..}`.
///
/// Server-originated frames (`connected`, `user-joined`, `user-left`) carry
/// their payload under `data`. Objects with any other key beside `type` and
/// `data` are left as they are.
fn lift_data_envelope(value: Value) -> Value {
    let Value::Object(mut object) = value else {
        return value;
    };
    let enveloped = object.len() == 2 && object.get("data").is_some_and(Value::is_object);
    if !enveloped {
        return Value::Object(object);
    }
    if let Some(Value::Object(data)) = object.remove("data") {
        for (key, field) in data {
            if key != "type" {
                object.insert(key, field);
            }
        }
    }
    Value::Object(object)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
