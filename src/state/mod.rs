//! Client-local session state. Pure and synchronous; no I/O.

pub mod execution;
pub mod roster;
pub mod session;
pub mod templates;

pub use execution::{ExecutionOutput, LineKind, OutputLine, PendingExecution, RunStatus};
pub use session::{EditorView, Notice, Phase, SessionError, SessionState};
