//! Client core for shared code-editing sessions.
//!
//! SYSTEM CONTEXT
//! ==============
//! Participants join a session over one WebSocket, edit a single shared text
//! buffer, switch the session language and run the code through an HTTP
//! execution service. `net` moves frames and requests, `state` holds the
//! client-local view, and `coordinator` binds both to one session's lifetime.

pub mod config;
pub mod coordinator;
pub mod net;
pub mod state;

pub use frames::{ClientFrame, Language, Participant, ServerFrame};
