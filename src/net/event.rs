//! Typed events surfaced by a session connection.
//!
//! Inbound frames and transport lifecycle changes are both delivered as
//! [`Event`] values; [`EventKind`] is the name callbacks subscribe under.

use std::fmt;
use std::str::FromStr;

use frames::{Language, Participant, ServerFrame};

/// Subscription key for [`Event`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Handshake finished or the server confirmed admission.
    Connected,
    /// The connection is gone, by either side.
    Disconnected,
    /// One participant arrived.
    UserJoined,
    /// One participant left.
    UserLeft,
    /// Full roster replacement.
    UsersUpdated,
    /// Room-wide language switch.
    LanguageChanged,
    /// Remote whole-text replacement.
    CodeUpdate,
    /// Transport fault; the dedicated error channel.
    Error,
}

impl EventKind {
    pub const ALL: [Self; 8] = [
        Self::Connected,
        Self::Disconnected,
        Self::UserJoined,
        Self::UserLeft,
        Self::UsersUpdated,
        Self::LanguageChanged,
        Self::CodeUpdate,
        Self::Error,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::UserJoined => "user-joined",
            Self::UserLeft => "user-left",
            Self::UsersUpdated => "users-updated",
            Self::LanguageChanged => "language-changed",
            Self::CodeUpdate => "code-update",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event name that no [`EventKind`] carries.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown event name: {0}")]
pub struct UnknownEvent(pub String);

impl FromStr for EventKind {
    type Err = UnknownEvent;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| UnknownEvent(raw.to_owned()))
    }
}

/// One event delivered by a connection, in transport receive order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Connected { session_id: String, user_id: Option<String> },
    Disconnected { session_id: String, reason: Option<String> },
    UserJoined(Participant),
    UserLeft { id: String },
    UsersUpdated(Vec<Participant>),
    LanguageChanged(Language),
    CodeUpdate(String),
    Error(String),
}

impl Event {
    /// Translate an inbound frame received on the connection for `session_id`.
    #[must_use]
    pub fn from_frame(session_id: &str, frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Connected { session_id: confirmed, user_id } => Self::Connected {
                session_id: confirmed.unwrap_or_else(|| session_id.to_owned()),
                user_id,
            },
            ServerFrame::UserJoined(participant) => Self::UserJoined(participant),
            ServerFrame::UserLeft { id } => Self::UserLeft { id },
            ServerFrame::UsersUpdated { users } => Self::UsersUpdated(users),
            ServerFrame::LanguageChanged { language } => Self::LanguageChanged(language),
            ServerFrame::CodeUpdate { code } => Self::CodeUpdate(code),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected { .. } => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::UserJoined(_) => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::UsersUpdated(_) => EventKind::UsersUpdated,
            Self::LanguageChanged(_) => EventKind::LanguageChanged,
            Self::CodeUpdate(_) => EventKind::CodeUpdate,
            Self::Error(_) => EventKind::Error,
        }
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod tests;
