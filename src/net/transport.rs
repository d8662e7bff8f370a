//! WebSocket transport for one live session connection.
//!
//! DESIGN
//! ======
//! A [`Connection`] owns a background socket task and two channels: outbound
//! text frames go to the task, inbound [`Event`]s come back. The owner pulls
//! events with [`Connection::next_event`], which updates the lifecycle state
//! and runs registered callbacks before returning the event, so every state
//! change and callback happens on the owner's task, in receive order.
//!
//! [`TransportClient`] holds at most one connection. Opening a new one closes
//! the previous one first, and dropping the client (or the connection)
//! releases it.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns a transport fault to the caller. Handshake failures,
//! socket errors and malformed frames are logged and surfaced as `error` /
//! `disconnected` events; sends on a connection that is not open are dropped
//! with a warning and reported through the `bool` return.

use std::time::Duration;

use frames::{ClientFrame, CodecError, ServerFrame, Tagged};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::event::{Event, EventKind};
use super::registry::{ListenerId, Registry};
use crate::config::ClientConfig;

/// Transport faults. Reported as `error` events, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The base URL cannot be turned into a websocket URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    /// The websocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    /// The websocket handshake did not finish in time.
    #[error("websocket handshake timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// Reading from the open socket failed.
    #[error("websocket receive failed: {0}")]
    Receive(Box<tokio_tungstenite::tungstenite::Error>),
    /// Writing to the open socket failed.
    #[error("websocket send failed: {0}")]
    Send(Box<tokio_tungstenite::tungstenite::Error>),
}

/// Lifecycle of one connection as observed by its owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in flight.
    #[default]
    Connecting,
    /// Handshake done; sends are transmitted.
    Open,
    /// Closed by either side. Terminal.
    Closed,
}

/// Build the upgrade URL for `session_id` from an `http(s)://` base URL.
///
/// # Errors
///
/// Returns [`TransportError::InvalidBaseUrl`] when the base is not HTTP(S) or
/// cannot carry a path.
pub fn session_url(base_url: &str, session_id: &str, credential: &str) -> Result<String, TransportError> {
    let invalid = || TransportError::InvalidBaseUrl(base_url.to_owned());
    let ws_base = if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        return Err(invalid());
    };

    let mut url = reqwest::Url::parse(&ws_base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .push("sessions")
        .push(session_id);
    url.query_pairs_mut().append_pair("token", credential);
    Ok(url.into())
}

// =============================================================================
// CONNECTION
// =============================================================================

/// One session connection and its subscription registry.
pub struct Connection {
    session_id: String,
    state: ConnectionState,
    registry: Registry,
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: Option<mpsc::UnboundedReceiver<Event>>,
    task: Option<JoinHandle<()>>,
    released: bool,
}

impl Connection {
    /// Start the socket task for `url`. Must be called inside a Tokio runtime.
    fn open(url: String, session_id: &str, connect_timeout: Duration) -> Self {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(url, session_id.to_owned(), connect_timeout, out_rx, in_tx));
        Self::with_channels(session_id, Some(out_tx), in_rx, Some(task))
    }

    /// A connection that failed before any IO; it only replays the failure.
    fn failed(session_id: &str, error: &TransportError) -> Self {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        warn!(%session_id, error = %error, "ws: cannot open connection");
        deliver(&in_tx, Event::Error(error.to_string()));
        deliver(&in_tx, Event::Disconnected { session_id: session_id.to_owned(), reason: Some(error.to_string()) });
        Self::with_channels(session_id, None, in_rx, None)
    }

    fn with_channels(
        session_id: &str,
        outbound: Option<mpsc::UnboundedSender<String>>,
        inbound: mpsc::UnboundedReceiver<Event>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            session_id: session_id.to_owned(),
            state: ConnectionState::Connecting,
            registry: Registry::new(),
            outbound,
            inbound: Some(inbound),
            task,
            released: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Register `callback` for `kind`. Callbacks for one kind run in registration order.
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.registry.on(kind, callback)
    }

    /// Remove a callback registered with [`Connection::on`]. No-op if absent.
    pub fn off(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.registry.off(kind, id)
    }

    /// Transmit `frame` if the connection is open.
    ///
    /// Returns `false` (after logging a warning) when the frame was dropped.
    /// Frames are never queued for a later open or retried.
    pub fn send(&self, frame: &ClientFrame) -> bool {
        if self.state != ConnectionState::Open {
            warn!(session_id = %self.session_id, frame = frame.type_name(), state = ?self.state, "ws: not connected; frame dropped");
            return false;
        }
        let Some(tx) = &self.outbound else {
            warn!(session_id = %self.session_id, frame = frame.type_name(), "ws: no socket; frame dropped");
            return false;
        };
        if tx.send(frames::encode_frame(frame)).is_err() {
            warn!(session_id = %self.session_id, frame = frame.type_name(), "ws: socket task gone; frame dropped");
            return false;
        }
        debug!(session_id = %self.session_id, frame = frame.type_name(), "ws: frame queued");
        true
    }

    /// Wait for the next event, apply it to the lifecycle state and run callbacks.
    ///
    /// Returns `None` once the connection is released or its socket task has
    /// delivered everything.
    pub async fn next_event(&mut self) -> Option<Event> {
        let event = self.inbound.as_mut()?.recv().await?;
        match &event {
            Event::Connected { .. } if self.state == ConnectionState::Connecting => {
                self.state = ConnectionState::Open;
            }
            Event::Disconnected { .. } => {
                self.state = ConnectionState::Closed;
                self.outbound = None;
            }
            _ => {}
        }
        self.registry.emit(&event);
        Some(event)
    }

    /// Close the connection and release every callback. Idempotent.
    pub fn disconnect(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let was_connecting = self.state == ConnectionState::Connecting;
        self.state = ConnectionState::Closed;
        // Dropping the sender lets an open socket task send a close frame and exit.
        self.outbound = None;
        self.inbound = None;
        self.registry.clear();
        if let Some(task) = self.task.take()
            && was_connecting
        {
            task.abort();
        }
        info!(session_id = %self.session_id, "ws: connection released");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =============================================================================
// TRANSPORT CLIENT
// =============================================================================

/// Owner of the single live [`Connection`].
pub struct TransportClient {
    base_url: String,
    connect_timeout: Duration,
    active: Option<Connection>,
}

impl TransportClient {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self { base_url: config.base_url.clone(), connect_timeout: config.timeouts.connect(), active: None }
    }

    /// Open a connection to `session_id`, closing any previous one first.
    ///
    /// Returns immediately; the outcome arrives as `connected` or
    /// `error` + `disconnected` events. Must be called inside a Tokio runtime.
    pub fn connect(&mut self, session_id: &str, credential: &str) -> &mut Connection {
        if let Some(mut previous) = self.active.take() {
            info!(previous = %previous.session_id(), next = %session_id, "ws: closing previous connection");
            previous.disconnect();
        }
        let connection = match session_url(&self.base_url, session_id, credential) {
            Ok(url) => {
                info!(%session_id, "ws: connecting");
                Connection::open(url, session_id, self.connect_timeout)
            }
            Err(e) => Connection::failed(session_id, &e),
        };
        self.active.insert(connection)
    }

    #[must_use]
    pub fn connection(&self) -> Option<&Connection> {
        self.active.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.active.as_mut()
    }

    /// Send on the active connection; see [`Connection::send`].
    pub fn send(&self, frame: &ClientFrame) -> bool {
        match &self.active {
            Some(connection) => connection.send(frame),
            None => {
                warn!(frame = frame.type_name(), "ws: no connection; frame dropped");
                false
            }
        }
    }

    /// Next event of the active connection, `None` without one.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.active.as_mut()?.next_event().await
    }

    /// Close and forget the active connection. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.active.take() {
            connection.disconnect();
        }
    }
}

// =============================================================================
// SOCKET TASK
// =============================================================================

fn deliver(events: &mpsc::UnboundedSender<Event>, event: Event) {
    if events.send(event).is_err() {
        debug!("ws: event receiver released; event dropped");
    }
}

/// Connect, then relay frames both ways until either side closes.
async fn run_socket(
    url: String,
    session_id: String,
    connect_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<Event>,
) {
    let handshake = tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await;
    let stream = match handshake {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            fail(&events, &session_id, &TransportError::Connect(Box::new(e)));
            return;
        }
        Err(_elapsed) => {
            fail(&events, &session_id, &TransportError::ConnectTimeout(connect_timeout));
            return;
        }
    };

    info!(%session_id, "ws: connected");
    deliver(&events, Event::Connected { session_id: session_id.clone(), user_id: None });

    let (mut ws_write, mut ws_read) = stream.split();
    let reason = loop {
        tokio::select! {
            incoming = ws_read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_event(&session_id, text.as_str()) {
                        deliver(&events, event);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    warn!(%session_id, len = bytes.len(), "ws: binary message ignored");
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_owned());
                    break Some(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let err = TransportError::Receive(Box::new(e));
                    warn!(%session_id, error = %err, "ws: receive failed");
                    deliver(&events, Event::Error(err.to_string()));
                    break Some(err.to_string());
                }
                None => break Some("connection closed".to_owned()),
            },
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                        let err = TransportError::Send(Box::new(e));
                        warn!(%session_id, error = %err, "ws: send failed");
                        deliver(&events, Event::Error(err.to_string()));
                        break Some(err.to_string());
                    }
                }
                None => {
                    if let Err(e) = ws_write.send(Message::Close(None)).await {
                        debug!(%session_id, error = %e, "ws: close frame not sent");
                    }
                    break None;
                }
            },
        }
    };

    info!(%session_id, reason = reason.as_deref().unwrap_or("released"), "ws: disconnected");
    deliver(&events, Event::Disconnected { session_id, reason });
}

fn fail(events: &mpsc::UnboundedSender<Event>, session_id: &str, error: &TransportError) {
    warn!(%session_id, error = %error, "ws: handshake failed");
    deliver(events, Event::Error(error.to_string()));
    deliver(events, Event::Disconnected { session_id: session_id.to_owned(), reason: Some(error.to_string()) });
}

/// Decode one inbound text message. Malformed frames are logged and dropped.
fn decode_event(session_id: &str, text: &str) -> Option<Event> {
    match frames::decode_frame::<ServerFrame>(text) {
        Ok(frame) => {
            debug!(%session_id, frame = frame.type_name(), "ws: frame received");
            Some(Event::from_frame(session_id, frame))
        }
        Err(CodecError::UnknownType(kind)) => {
            debug!(%session_id, %kind, "ws: frame type not handled");
            None
        }
        Err(e) => {
            warn!(%session_id, error = %e, "ws: malformed frame dropped");
            None
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
