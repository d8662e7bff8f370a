//! Session state machine for one shared editing session.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionState` is the client-local projection of a session: code text,
//! language, roster, run state and queued notices. It is pure and
//! synchronous. Every transition that needs the wire returns the frames it
//! wants sent; the coordinator owns the socket and does the sending.
//!
//! CONSISTENCY
//! ===========
//! Local edits apply immediately. A remote `code-update` replaces the text
//! outright, so whichever update is processed last is what the user sees.
//! Concurrent typing from two peers can drop one side's keystrokes.

use std::collections::VecDeque;

use frames::{ClientFrame, Language, Participant, UnsupportedLanguage};
use tracing::{debug, info};

use super::execution::{ExecutionOutput, PendingExecution, RunStatus};
use super::roster;
use super::templates::template;
use crate::net::event::Event;
use crate::net::types::ExecutionResult;

/// Validation faults. State is unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),
    #[error("a run is already pending (seq {0})")]
    RunPending(u64),
    #[error("session id must not be empty")]
    EmptySessionId,
    #[error("session has been left")]
    SessionLeft,
}

/// Session lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Connecting,
    Joined,
    /// Terminal.
    Left,
}

/// Something the UI should tell the user once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Joined { session_id: String },
    PeerJoined { id: String, name: String },
    PeerLeft { id: String, name: Option<String> },
    Disconnected { reason: Option<String> },
    TransportError(String),
}

/// What the editor widget renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditorView<'a> {
    pub text: &'a str,
    pub language: Language,
    /// Bumped on every text replacement.
    pub revision: u64,
}

/// Outbound intents made before `Joined`, latest value per kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Deferred {
    language: Option<Language>,
    code: Option<String>,
}

impl Deferred {
    fn drain(&mut self) -> Vec<ClientFrame> {
        let mut frames = Vec::new();
        if let Some(language) = self.language.take() {
            frames.push(ClientFrame::LanguageChange { language });
        }
        if let Some(code) = self.code.take() {
            frames.push(ClientFrame::CodeUpdate { code });
        }
        frames
    }
}

#[derive(Clone, Debug)]
pub struct SessionState {
    session_id: String,
    phase: Phase,
    self_id: Option<String>,
    code: String,
    language: Language,
    revision: u64,
    roster: Vec<Participant>,
    pending: Option<PendingExecution>,
    output: Option<ExecutionOutput>,
    next_seq: u64,
    deferred: Deferred,
    notices: VecDeque<Notice>,
    last_error: Option<String>,
}

impl SessionState {
    /// Fresh state for `session_id`, showing `language`'s template.
    #[must_use]
    pub fn new(session_id: impl Into<String>, language: Language) -> Self {
        Self {
            session_id: session_id.into(),
            phase: Phase::Connecting,
            self_id: None,
            code: template(language).to_owned(),
            language,
            revision: 0,
            roster: Vec::new(),
            pending: None,
            output: None,
            next_seq: 0,
            deferred: Deferred::default(),
            notices: VecDeque::new(),
            last_error: None,
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn editor_view(&self) -> EditorView<'_> {
        EditorView { text: &self.code, language: self.language, revision: self.revision }
    }

    /// Roster in server order, exactly as last received.
    #[must_use]
    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    #[must_use]
    pub fn self_id(&self) -> Option<&str> {
        self.self_id.as_deref()
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingExecution> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn output(&self) -> Option<&ExecutionOutput> {
        self.output.as_ref()
    }

    /// Pending while a run is in flight, otherwise the last output's status.
    #[must_use]
    pub fn run_status(&self) -> Option<RunStatus> {
        if self.pending.is_some() {
            return Some(RunStatus::Pending);
        }
        self.output.as_ref().map(ExecutionOutput::status)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Drain queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // -------------------------------------------------------------------------
    // Local intents
    // -------------------------------------------------------------------------

    /// Replace the code text. Returns the frame to send once joined.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionLeft`] after teardown.
    pub fn apply_local_edit(&mut self, text: &str) -> Result<Option<ClientFrame>, SessionError> {
        self.ensure_active()?;
        if text == self.code {
            return Ok(None);
        }
        self.replace_code(text.to_owned());
        Ok(self.outbound(ClientFrame::CodeUpdate { code: text.to_owned() }))
    }

    /// Switch language, resetting the text to the new template.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnsupportedLanguage`] for unknown names, or
    /// [`SessionError::SessionLeft`] after teardown.
    pub fn change_language(&mut self, raw: &str) -> Result<Option<ClientFrame>, SessionError> {
        self.ensure_active()?;
        let language: Language = raw.parse()?;
        self.switch_language(language);
        Ok(self.outbound(ClientFrame::LanguageChange { language }))
    }

    /// Start a run of `code` and return the request to execute.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunPending`] while another run is in flight.
    pub fn begin_run(&mut self, code: &str, language: Language) -> Result<PendingExecution, SessionError> {
        self.ensure_active()?;
        if let Some(pending) = &self.pending {
            return Err(SessionError::RunPending(pending.seq));
        }
        self.next_seq += 1;
        let pending = PendingExecution { seq: self.next_seq, code: code.to_owned(), language };
        self.pending = Some(pending.clone());
        self.output = None;
        info!(session_id = %self.session_id, seq = pending.seq, %language, "session: run started");
        Ok(pending)
    }

    /// Resolve run `seq`. Returns false when the completion is stale.
    pub fn complete_run(&mut self, seq: u64, outcome: Result<ExecutionResult, String>) -> bool {
        let Some(pending) = self.pending.take_if(|pending| pending.seq == seq) else {
            debug!(session_id = %self.session_id, seq, "session: stale run completion dropped");
            return false;
        };
        let output = ExecutionOutput::complete(pending, outcome);
        info!(
            session_id = %self.session_id,
            seq,
            success = output.result.success,
            execution_time_ms = output.result.execution_time_ms,
            "session: run finished"
        );
        self.output = Some(output);
        true
    }

    /// Discard the last output. A pending run is untouched.
    pub fn clear_output(&mut self) {
        self.output = None;
    }

    // -------------------------------------------------------------------------
    // Remote events
    // -------------------------------------------------------------------------

    /// Apply one transport event. Returns frames to send as a result.
    pub fn apply_event(&mut self, event: &Event) -> Vec<ClientFrame> {
        if self.phase == Phase::Left {
            debug!(session_id = %self.session_id, event = %event.kind(), "session: event after leave ignored");
            return Vec::new();
        }
        match event {
            Event::Connected { user_id, .. } => return self.on_connected(user_id.as_deref()),
            Event::Disconnected { reason, .. } => self.on_disconnected(reason.clone()),
            Event::UserJoined(participant) => self.on_peer_joined(participant),
            Event::UserLeft { id } => self.on_peer_left(id),
            Event::UsersUpdated(users) => self.on_roster_snapshot(users.clone()),
            Event::LanguageChanged(language) => self.on_remote_language(*language),
            Event::CodeUpdate(code) => self.on_remote_code(code),
            Event::Error(message) => {
                self.last_error = Some(message.clone());
                self.notices.push_back(Notice::TransportError(message.clone()));
            }
        }
        Vec::new()
    }

    /// Replace the roster wholesale, preserving server order.
    pub fn on_roster_snapshot(&mut self, users: Vec<Participant>) {
        if let Some(me) = users.iter().find(|p| p.is_current_user) {
            self.self_id = Some(me.id.clone());
        }
        self.roster = users;
    }

    /// Announce a peer. The roster changes only via snapshots.
    pub fn on_peer_joined(&mut self, participant: &Participant) {
        if roster::is_self(participant, self.self_id.as_deref()) {
            return;
        }
        self.notices.push_back(Notice::PeerJoined { id: participant.id.clone(), name: participant.name.clone() });
    }

    pub fn on_peer_left(&mut self, id: &str) {
        if self.self_id.as_deref() == Some(id) {
            return;
        }
        let name = roster::name_of(&self.roster, id).map(str::to_owned);
        self.notices.push_back(Notice::PeerLeft { id: id.to_owned(), name });
    }

    pub fn on_remote_code(&mut self, code: &str) {
        self.deferred.code = None;
        if code != self.code {
            self.replace_code(code.to_owned());
        }
    }

    pub fn on_remote_language(&mut self, language: Language) {
        self.deferred = Deferred::default();
        self.switch_language(language);
    }

    /// Leave for good and drop everything but the editor text.
    pub fn teardown(&mut self) {
        if self.phase != Phase::Left {
            info!(session_id = %self.session_id, "session: left");
        }
        self.phase = Phase::Left;
        self.roster.clear();
        self.pending = None;
        self.output = None;
        self.deferred = Deferred::default();
        self.notices.clear();
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn on_connected(&mut self, user_id: Option<&str>) -> Vec<ClientFrame> {
        if let Some(id) = user_id {
            self.self_id = Some(id.to_owned());
        }
        if self.phase != Phase::Connecting {
            return Vec::new();
        }
        self.phase = Phase::Joined;
        info!(session_id = %self.session_id, user_id = ?self.self_id, "session: joined");
        self.notices.push_back(Notice::Joined { session_id: self.session_id.clone() });
        self.deferred.drain()
    }

    fn on_disconnected(&mut self, reason: Option<String>) {
        info!(session_id = %self.session_id, reason = ?reason, "session: disconnected");
        self.phase = Phase::Left;
        self.roster.clear();
        self.pending = None;
        self.deferred = Deferred::default();
        self.notices.push_back(Notice::Disconnected { reason });
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.phase == Phase::Left {
            return Err(SessionError::SessionLeft);
        }
        Ok(())
    }

    /// Frame to send now, or `None` after parking it until joined.
    fn outbound(&mut self, frame: ClientFrame) -> Option<ClientFrame> {
        if self.phase == Phase::Joined {
            return Some(frame);
        }
        match frame {
            ClientFrame::LanguageChange { language } => {
                self.deferred.language = Some(language);
                self.deferred.code = None;
            }
            ClientFrame::CodeUpdate { code } => self.deferred.code = Some(code),
        }
        None
    }

    fn switch_language(&mut self, language: Language) {
        self.language = language;
        self.replace_code(template(language).to_owned());
        self.pending = None;
        self.output = None;
    }

    fn replace_code(&mut self, code: String) {
        self.code = code;
        self.revision += 1;
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
