use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::Role;
use tungstenite::protocol::frame::coding::CloseCode;

use super::{CloseReason, Session, SessionState, is_peer_disconnect};
use crate::config::{HubSettings, ServerStartup};
use crate::guard::ConnectionContext;
use crate::hub::{BroadcastHub, LocationEvent};
use crate::registry::GroupRegistry;
use crate::utils::{CancelReason, Error};

type ClientWs = WebSocketStream<DuplexStream>;

fn hub_with_capacity(max: usize) -> Arc<BroadcastHub> {
    Arc::new(BroadcastHub::new(Arc::new(GroupRegistry::new()), max))
}

fn startup() -> ServerStartup {
    ServerStartup::at(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap())
}

async fn ws_pair() -> (WebSocketStream<DuplexStream>, ClientWs) {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (server, client)
}

async fn next_message(client: &mut ClientWs) -> WsMessage {
    tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("websocket error")
}

async fn next_json(client: &mut ClientWs) -> Value {
    let msg = next_message(client).await;
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

struct Running {
    hub: Arc<BroadcastHub>,
    client: ClientWs,
    handle: crate::client::SubscriberHandle,
    state: tokio::sync::watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    disconnect: CancellationToken,
    task: tokio::task::JoinHandle<crate::utils::Result<CloseReason>>,
}

async fn start_session(hub: Arc<BroadcastHub>) -> Running {
    let shutdown = CancellationToken::new();
    let ctx = ConnectionContext::new(None, shutdown.clone());
    let disconnect = ctx.disconnect().clone();
    let session = Session::new(ctx.handle(), hub.clone(), startup(), &HubSettings::default());
    let handle = session.handle();
    let state = session.state();
    let (server, client) = ws_pair().await;

    let task = tokio::spawn(async move { session.run(server, &ctx).await });

    Running {
        hub,
        client,
        handle,
        state,
        shutdown,
        disconnect,
        task,
    }
}

fn location(id: i64) -> LocationEvent {
    LocationEvent::new(id, json!({ "id": id, "lat": 48.85, "lon": 2.35 }))
}

#[tokio::test]
async fn test_first_frame_is_welcome() {
    let mut running = start_session(hub_with_capacity(10)).await;

    let welcome = next_json(&mut running.client).await;
    assert_eq!(
        welcome,
        json!({ "type": "welcome", "server_startup": startup().as_secs_f64() })
    );
}

#[tokio::test]
async fn test_session_joins_topic_before_welcome() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;

    let members = running.hub.registry().members("locations");
    assert!(members.contains(&running.handle));
    running
        .state
        .wait_for(|s| *s == SessionState::Open)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_published_events_are_forwarded_in_order() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;

    running.hub.publish("locations", location(1)).unwrap();
    running.hub.publish("locations", location(2)).unwrap();

    let first = next_json(&mut running.client).await;
    let second = next_json(&mut running.client).await;
    assert_eq!(first, json!({ "type": "location", "data": { "id": 1, "lat": 48.85, "lon": 2.35 } }));
    assert_eq!(second["data"]["id"], 2);
}

#[tokio::test]
async fn test_inbound_frames_are_ignored() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;

    running
        .client
        .send(WsMessage::text("hello"))
        .await
        .unwrap();
    running.hub.publish("locations", location(3)).unwrap();

    let frame = next_json(&mut running.client).await;
    assert_eq!(frame["type"], "location");
}

#[tokio::test]
async fn test_graceful_close_removes_membership() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;

    running.client.close(None).await.unwrap();
    let reason = running.task.await.unwrap().unwrap();

    assert_eq!(reason, CloseReason::ClientClosed);
    assert!(running.hub.registry().members("locations").is_empty());
    assert!(running.hub.registry().topics_of(&running.handle).is_empty());
    assert_eq!(running.hub.subscriber_count(), 0);
    assert_eq!(*running.state.borrow(), SessionState::Closed);
}

#[tokio::test]
async fn test_abrupt_disconnect_is_reported_as_peer_cancellation() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;

    drop(running.client);
    let err = running.task.await.unwrap().unwrap_err();

    assert!(err.is_peer_disconnect());
    assert!(running.disconnect.is_cancelled());
    assert!(running.hub.registry().members("locations").is_empty());
    assert_eq!(running.hub.subscriber_count(), 0);
    assert_eq!(*running.state.borrow(), SessionState::Closed);
}

#[tokio::test]
async fn test_shutdown_closes_session_and_cleans_up() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;

    running.shutdown.cancel();

    match next_message(&mut running.client).await {
        WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Away),
        other => panic!("expected close frame, got {other:?}"),
    }
    let err = running.task.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Cancelled(CancelReason::Shutdown)));
    assert!(!running.disconnect.is_cancelled());
    assert!(running.hub.registry().members("locations").is_empty());
}

#[tokio::test]
async fn test_aborted_session_still_cleans_up() {
    let mut running = start_session(hub_with_capacity(10)).await;
    next_json(&mut running.client).await;
    assert_eq!(running.hub.subscriber_count(), 1);

    running.task.abort();
    assert!(running.task.await.unwrap_err().is_cancelled());

    assert!(running.hub.registry().members("locations").is_empty());
    assert_eq!(running.hub.subscriber_count(), 0);
    assert_eq!(*running.state.borrow(), SessionState::Closed);
}

#[tokio::test]
async fn test_session_rejected_at_capacity() {
    let mut running = start_session(hub_with_capacity(0)).await;

    match next_message(&mut running.client).await {
        WsMessage::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Again),
        other => panic!("expected close frame, got {other:?}"),
    }
    let reason = running.task.await.unwrap().unwrap();
    assert_eq!(reason, CloseReason::Rejected);
    assert!(running.hub.registry().members("locations").is_empty());
    assert_eq!(*running.state.borrow(), SessionState::Closed);
}

#[test]
fn test_peer_disconnect_classification() {
    use std::io;
    use tungstenite::Error as WsError;
    use tungstenite::error::ProtocolError;

    assert!(is_peer_disconnect(&WsError::ConnectionClosed));
    assert!(is_peer_disconnect(&WsError::Protocol(
        ProtocolError::ResetWithoutClosingHandshake
    )));
    assert!(is_peer_disconnect(&WsError::Io(io::Error::from(
        io::ErrorKind::ConnectionReset
    ))));
    assert!(!is_peer_disconnect(&WsError::Io(io::Error::from(
        io::ErrorKind::PermissionDenied
    ))));
    assert!(!is_peer_disconnect(&WsError::Protocol(
        ProtocolError::HandshakeIncomplete
    )));
}
