//! End-to-end session flows against a scripted local WebSocket peer.

use std::sync::Arc;
use std::time::Duration;

use codepair::config::ClientConfig;
use codepair::coordinator::{SessionCoordinator, Update};
use codepair::net::api::{ApiError, Executor};
use codepair::net::event::EventKind;
use codepair::net::types::{ExecuteRequest, ExecutionResult};
use codepair::state::templates::template;
use codepair::state::{Notice, Phase};
use codepair::{Language, Participant};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

const WAIT: Duration = Duration::from_secs(5);

struct Peer {
    config: ClientConfig,
    uri: oneshot::Receiver<String>,
    inbox: mpsc::UnboundedReceiver<String>,
    outbox: mpsc::UnboundedSender<String>,
}

impl Peer {
    fn push(&self, frame: &Value) {
        self.outbox.send(frame.to_string()).unwrap();
    }

    fn push_raw(&self, text: &str) {
        self.outbox.send(text.to_owned()).unwrap();
    }

    async fn received(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.inbox.recv()).await.unwrap().unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// Accept one client; relay `outbox` to it and its text frames to `inbox`.
/// Dropping `outbox` closes the socket from the server side.
async fn spawn_peer() -> Peer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (uri_tx, uri) = oneshot::channel();
    let (inbox_tx, inbox) = mpsc::unbounded_channel();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let capture = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(request.uri().to_string());
            Ok(response)
        };
        let ws = tokio_tungstenite::accept_hdr_async(stream, capture).await.unwrap();
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                out = outbox_rx.recv() => match out {
                    Some(text) => sink.send(Message::Text(text.into())).await.unwrap(),
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = inbox_tx.send(text.as_str().to_owned());
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    });

    let config = ClientConfig::new(&format!("http://{addr}")).unwrap().with_token("tok");
    Peer { config, uri, inbox, outbox }
}

struct IdleExecutor;

#[async_trait::async_trait]
impl Executor for IdleExecutor {
    async fn execute(&self, _request: &ExecuteRequest) -> Result<ExecutionResult, ApiError> {
        Ok(ExecutionResult { success: true, output: String::new(), error: None, execution_time_ms: 0 })
    }
}

fn join(peer: &Peer, session_id: &str) -> SessionCoordinator {
    SessionCoordinator::join(&peer.config, session_id, Language::JavaScript, Arc::new(IdleExecutor)).unwrap()
}

async fn wait_for(coordinator: &mut SessionCoordinator, kind: EventKind) {
    let update = tokio::time::timeout(WAIT, coordinator.drive_until(|u, _| *u == Update::Event(kind)))
        .await
        .unwrap();
    assert_eq!(update, Some(Update::Event(kind)), "session ended before {kind}");
}

fn ada() -> Value {
    json!({"id": "u1", "name": "Ada", "color": "#fff", "isCurrentUser": true})
}

#[tokio::test]
async fn join_then_roster_snapshot_exposes_exact_roster() {
    let mut peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    assert_eq!(coordinator.state().phase(), Phase::Connecting);

    wait_for(&mut coordinator, EventKind::Connected).await;
    assert_eq!(coordinator.state().phase(), Phase::Joined);
    assert!(coordinator.state().roster().is_empty());
    assert_eq!((&mut peer.uri).await.unwrap(), "/sessions/abc123?token=tok");

    peer.push(&json!({"type": "users-updated", "users": [ada()]}));
    wait_for(&mut coordinator, EventKind::UsersUpdated).await;

    let expected: Participant = serde_json::from_value(ada()).unwrap();
    assert_eq!(coordinator.state().roster(), [expected].as_slice());
    assert_eq!(coordinator.state().self_id(), Some("u1"));
}

#[tokio::test]
async fn local_edit_goes_out_as_code_update() {
    let mut peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;

    coordinator.apply_local_edit("console.log(2);").unwrap();
    assert_eq!(peer.received().await, json!({"type": "code-update", "code": "console.log(2);"}));

    coordinator.change_language("python").unwrap();
    assert_eq!(peer.received().await, json!({"type": "language-change", "language": "python"}));
}

#[tokio::test]
async fn intents_before_join_are_flushed_in_order() {
    let mut peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");

    coordinator.change_language("go").unwrap();
    coordinator.apply_local_edit("package main").unwrap();
    wait_for(&mut coordinator, EventKind::Connected).await;

    assert_eq!(peer.received().await, json!({"type": "language-change", "language": "go"}));
    assert_eq!(peer.received().await, json!({"type": "code-update", "code": "package main"}));
}

#[tokio::test]
async fn malformed_frames_do_not_block_later_frames() {
    let peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;

    peer.push_raw("{oops");
    peer.push_raw(r#"{"type":"cursor-move","x":1}"#);
    peer.push_raw(r#"{"code":"no type"}"#);
    peer.push(&json!({"type": "code-update", "code": "B"}));
    wait_for(&mut coordinator, EventKind::CodeUpdate).await;

    assert_eq!(coordinator.state().code(), "B");
    assert_eq!(coordinator.state().phase(), Phase::Joined);
}

#[tokio::test]
async fn remote_update_processed_after_local_edit_wins() {
    let peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;

    coordinator.apply_local_edit("A").unwrap();
    peer.push(&json!({"type": "code-update", "code": "B"}));
    wait_for(&mut coordinator, EventKind::CodeUpdate).await;

    assert_eq!(coordinator.editor_view().text, "B");
}

#[tokio::test]
async fn relayed_language_change_resets_template() {
    let peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;
    coordinator.apply_local_edit("unsaved").unwrap();

    peer.push(&json!({"type": "language-change", "language": "python"}));
    wait_for(&mut coordinator, EventKind::LanguageChanged).await;

    assert_eq!(coordinator.state().language(), Language::Python);
    assert_eq!(coordinator.state().code(), template(Language::Python));
}

#[tokio::test]
async fn peer_join_and_leave_raise_notices() {
    let peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;
    coordinator.take_notices();

    peer.push(&json!({"type": "connected", "sessionId": "abc123", "userId": "u1"}));
    peer.push(&json!({"type": "user-joined", "id": "u1", "name": "Ada", "color": "#fff"}));
    peer.push(&json!({"type": "user-joined", "id": "u2", "name": "Grace", "color": "#0f0"}));
    peer.push(&json!({"type": "user-left", "id": "u2"}));
    wait_for(&mut coordinator, EventKind::UserLeft).await;

    assert_eq!(
        coordinator.take_notices(),
        vec![
            Notice::PeerJoined { id: "u2".into(), name: "Grace".into() },
            Notice::PeerLeft { id: "u2".into(), name: None },
        ]
    );
    assert!(coordinator.state().roster().is_empty());
}

#[tokio::test]
async fn enveloped_server_frames_identify_self_and_peers() {
    let peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;
    coordinator.take_notices();

    peer.push(&json!({"type": "connected", "data": {"sessionId": "abc123", "userId": "u1"}}));
    wait_for(&mut coordinator, EventKind::Connected).await;
    assert_eq!(coordinator.state().self_id(), Some("u1"));

    peer.push(&json!({"type": "user-joined", "data": {"id": "u1", "name": "Ada", "color": "#fff", "isCurrentUser": false}}));
    peer.push(&json!({"type": "user-joined", "data": {"id": "u2", "name": "Grace", "color": "#0f0", "isCurrentUser": false}}));
    peer.push(&json!({"type": "user-left", "data": {"id": "u2"}}));
    wait_for(&mut coordinator, EventKind::UserLeft).await;

    assert_eq!(
        coordinator.take_notices(),
        vec![
            Notice::PeerJoined { id: "u2".into(), name: "Grace".into() },
            Notice::PeerLeft { id: "u2".into(), name: None },
        ]
    );
}

#[tokio::test]
async fn server_close_moves_session_to_left() {
    let peer = spawn_peer().await;
    let mut coordinator = join(&peer, "abc123");
    wait_for(&mut coordinator, EventKind::Connected).await;
    coordinator.take_notices();

    drop(peer.outbox);
    wait_for(&mut coordinator, EventKind::Disconnected).await;

    assert_eq!(coordinator.state().phase(), Phase::Left);
    assert!(matches!(coordinator.take_notices().as_slice(), [Notice::Disconnected { .. }]));
    assert!(coordinator.next().await.is_none());
}

#[tokio::test]
async fn refused_connection_resolves_instead_of_hanging() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let config = ClientConfig::new(&format!("http://127.0.0.1:{port}")).unwrap();
    let mut coordinator =
        SessionCoordinator::join(&config, "abc123", Language::JavaScript, Arc::new(IdleExecutor)).unwrap();

    wait_for(&mut coordinator, EventKind::Disconnected).await;
    assert_eq!(coordinator.state().phase(), Phase::Left);
    assert!(coordinator.state().last_error().is_some());
}
