//! Network layer: the session socket and the HTTP collaborators.

pub mod api;
pub mod event;
pub mod registry;
pub mod transport;
pub mod types;

pub use api::{ApiError, Executor, HttpApi, SessionAdmission};
pub use event::{Event, EventKind, UnknownEvent};
pub use registry::{Callback, ListenerId};
pub use transport::{Connection, ConnectionState, TransportClient, TransportError};
pub use types::{ExecuteRequest, ExecutionResult};
