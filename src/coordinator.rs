//! Session coordinator: one session view's state, socket and executor.
//!
//! SYSTEM CONTEXT
//! ==============
//! The coordinator owns the [`TransportClient`] for as long as the session
//! view lives, so the connection is acquired on [`SessionCoordinator::join`]
//! and released on teardown or drop. All state changes happen on the task
//! that polls [`SessionCoordinator::next`]; run requests execute on spawned
//! tasks and come back as sequence-tagged completions through a channel.

use std::sync::Arc;

use frames::{ClientFrame, Language};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::net::api::Executor;
use crate::net::event::{Event, EventKind};
use crate::net::registry::ListenerId;
use crate::net::transport::{ConnectionState, TransportClient};
use crate::net::types::ExecutionResult;
use crate::state::{EditorView, Notice, Phase, RunStatus, SessionError, SessionState};

/// What one call to [`SessionCoordinator::next`] processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    /// A transport event was applied.
    Event(EventKind),
    /// A run finished and its output is visible.
    RunFinished { seq: u64, status: RunStatus },
    /// A run finished after it stopped being current.
    RunDiscarded { seq: u64 },
}

struct RunCompletion {
    seq: u64,
    outcome: Result<ExecutionResult, String>,
}

pub struct SessionCoordinator {
    state: SessionState,
    transport: TransportClient,
    executor: Arc<dyn Executor>,
    completions_tx: mpsc::UnboundedSender<RunCompletion>,
    completions_rx: mpsc::UnboundedReceiver<RunCompletion>,
}

impl SessionCoordinator {
    /// Connect to `session_id` and start in `Connecting`.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EmptySessionId`] for a blank id.
    pub fn join(
        config: &ClientConfig,
        session_id: &str,
        language: Language,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, SessionError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(SessionError::EmptySessionId);
        }
        let mut transport = TransportClient::new(config);
        transport.connect(session_id, config.credential());
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Ok(Self { state: SessionState::new(session_id, language), transport, executor, completions_tx, completions_rx })
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn editor_view(&self) -> EditorView<'_> {
        self.state.editor_view()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.transport.connection().map_or(ConnectionState::Closed, |c| c.state())
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.state.take_notices()
    }

    /// Observe raw transport events. `None` once torn down.
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> Option<ListenerId>
    where
        F: FnMut(&Event) + Send + 'static,
    {
        Some(self.transport.connection_mut()?.on(kind, callback))
    }

    pub fn off(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.transport.connection_mut().is_some_and(|c| c.off(kind, id))
    }

    // -------------------------------------------------------------------------
    // Intents
    // -------------------------------------------------------------------------

    /// Apply a local edit and broadcast it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SessionLeft`] after teardown.
    pub fn apply_local_edit(&mut self, text: &str) -> Result<(), SessionError> {
        if let Some(frame) = self.state.apply_local_edit(text)? {
            self.send(&frame);
        }
        Ok(())
    }

    /// Switch language for everyone in the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnsupportedLanguage`] for unknown names.
    pub fn change_language(&mut self, raw: &str) -> Result<(), SessionError> {
        if let Some(frame) = self.state.change_language(raw)? {
            self.send(&frame);
        }
        Ok(())
    }

    /// Execute `code` and return the run's sequence number.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunPending`] while a run is in flight, or
    /// [`SessionError::UnsupportedLanguage`] for unknown names.
    pub fn request_run(&mut self, code: &str, language: &str) -> Result<u64, SessionError> {
        let language: Language = language.parse()?;
        let pending = self.state.begin_run(code, language)?;
        let seq = pending.seq;
        let request = pending.request();
        let executor = Arc::clone(&self.executor);
        let completions = self.completions_tx.clone();

        tokio::spawn(async move {
            let outcome = executor.execute(&request).await.map_err(|e| e.to_string());
            if let Err(e) = &outcome {
                warn!(seq, error = %e, "run: execution call failed");
            }
            if completions.send(RunCompletion { seq, outcome }).is_err() {
                debug!(seq, "run: coordinator released; result dropped");
            }
        });
        Ok(seq)
    }

    /// Run the current editor text in the current language.
    ///
    /// # Errors
    ///
    /// See [`SessionCoordinator::request_run`].
    pub fn run_current(&mut self) -> Result<u64, SessionError> {
        let code = self.state.code().to_owned();
        let language = self.state.language();
        self.request_run(&code, language.as_str())
    }

    pub fn clear_output(&mut self) {
        self.state.clear_output();
    }

    /// Leave the session and close the connection. Idempotent.
    pub fn teardown(&mut self) {
        self.state.teardown();
        self.transport.disconnect();
    }

    // -------------------------------------------------------------------------
    // Event loop
    // -------------------------------------------------------------------------

    /// Wait for and apply the next transport event or run completion.
    ///
    /// Returns `None` once the session has been left.
    pub async fn next(&mut self) -> Option<Update> {
        if self.state.phase() == Phase::Left {
            return None;
        }
        tokio::select! {
            event = self.transport.next_event() => {
                let event = event?;
                let kind = event.kind();
                for frame in self.state.apply_event(&event) {
                    self.send(&frame);
                }
                if self.state.phase() == Phase::Left {
                    self.transport.disconnect();
                }
                Some(Update::Event(kind))
            }
            Some(done) = self.completions_rx.recv() => {
                let seq = done.seq;
                if self.state.complete_run(seq, done.outcome) {
                    let status = self.state.run_status().unwrap_or(RunStatus::Failed);
                    Some(Update::RunFinished { seq, status })
                } else {
                    Some(Update::RunDiscarded { seq })
                }
            }
        }
    }

    /// Process updates until one matches `done` or the session ends.
    pub async fn drive_until<F>(&mut self, mut done: F) -> Option<Update>
    where
        F: FnMut(&Update, &SessionState) -> bool,
    {
        while let Some(update) = self.next().await {
            if done(&update, &self.state) {
                return Some(update);
            }
        }
        None
    }

    fn send(&self, frame: &ClientFrame) {
        if !self.transport.send(frame) {
            debug!(session_id = %self.state.session_id(), "coordinator: frame not sent");
        }
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if self.state.phase() != Phase::Left {
            info!(session_id = %self.state.session_id(), "coordinator: dropped while active");
        }
        self.teardown();
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
