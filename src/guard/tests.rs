use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Level;

use super::{ConnectionContext, Guarded, disconnect_guard};
use crate::config::{HubSettings, ServerStartup};
use crate::hub::BroadcastHub;
use crate::registry::GroupRegistry;
use crate::session::{Session, SessionState};
use crate::utils::logging::capture::capture_logs;
use crate::utils::{CancelReason, Error};

fn context() -> ConnectionContext {
    ConnectionContext::new(None, CancellationToken::new())
}

#[tokio::test]
async fn test_completion_passes_through() {
    let (logs, _guard) = capture_logs();
    let ctx = context();

    let outcome = disconnect_guard(&ctx, async { Ok(42) }).await.unwrap();

    assert_eq!(outcome, Guarded::Completed(42));
    assert!(logs.events().is_empty());
}

#[tokio::test]
async fn test_disconnect_token_cancels_in_flight_handler() {
    let (logs, _guard) = capture_logs();
    let ctx = context();
    ctx.record_request("GET", "/ws/locations/");
    let disconnect = ctx.disconnect().clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        disconnect.cancel();
    });
    let outcome = disconnect_guard(&ctx, std::future::pending::<crate::utils::Result<()>>())
        .await
        .unwrap();

    assert_eq!(outcome, Guarded::Disconnected);
    assert_eq!(logs.count_matching("Client disconnected during"), 1);
    assert_eq!(logs.count_matching("GET /ws/locations/"), 1);
    assert_eq!(logs.count_at_level(Level::DEBUG), 1);
    assert_eq!(logs.count_at_level(Level::ERROR), 0);
}

#[tokio::test]
async fn test_peer_disconnect_error_is_absorbed() {
    let (logs, _guard) = capture_logs();
    let ctx = context();

    let outcome = disconnect_guard(&ctx, async {
        Err::<(), _>(Error::Cancelled(CancelReason::PeerDisconnected))
    })
    .await
    .unwrap();

    assert_eq!(outcome, Guarded::Disconnected);
    assert_eq!(logs.count_matching("Client disconnected during"), 1);
}

#[tokio::test]
async fn test_shutdown_cancellation_propagates() {
    let (logs, _guard) = capture_logs();
    let ctx = context();

    let err = disconnect_guard(&ctx, async {
        Err::<(), _>(Error::Cancelled(CancelReason::Shutdown))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Cancelled(CancelReason::Shutdown)));
    assert_eq!(logs.count_matching("Client disconnected during"), 0);
}

#[tokio::test]
async fn test_unrelated_fault_propagates() {
    let (logs, _guard) = capture_logs();
    let ctx = context();

    let err = disconnect_guard(&ctx, async {
        Err::<(), _>(Error::Io(io::Error::other("disk on fire")))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(logs.events().is_empty());
}

#[tokio::test]
async fn test_shutdown_token_is_not_absorbed() {
    let shutdown = CancellationToken::new();
    let ctx = ConnectionContext::new(None, shutdown.clone());
    shutdown.cancel();

    let err = disconnect_guard(&ctx, async {
        ctx.shutdown().cancelled().await;
        Err::<(), _>(Error::Cancelled(CancelReason::Shutdown))
    })
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Cancelled(CancelReason::Shutdown)));
    assert!(!ctx.disconnect().is_cancelled());
}

#[tokio::test]
async fn test_guarded_session_cleans_up_on_disconnect() {
    let hub = Arc::new(BroadcastHub::new(Arc::new(GroupRegistry::new()), 10));
    let ctx = context();
    let session = Session::new(
        ctx.handle(),
        hub.clone(),
        ServerStartup::now(),
        &HubSettings::default(),
    );
    let mut state = session.state();
    let (server_io, _client_io) = tokio::io::duplex(4096);
    let server = tokio_tungstenite::WebSocketStream::from_raw_socket(
        server_io,
        tungstenite::protocol::Role::Server,
        None,
    )
    .await;

    let disconnect = ctx.disconnect().clone();
    tokio::spawn(async move {
        state
            .wait_for(|s| *s == SessionState::Open)
            .await
            .unwrap();
        disconnect.cancel();
    });

    let outcome = disconnect_guard(&ctx, session.run(server, &ctx))
        .await
        .unwrap();

    assert_eq!(outcome, Guarded::Disconnected);
    assert!(hub.registry().members("locations").is_empty());
    assert_eq!(hub.subscriber_count(), 0);
}

#[test]
fn test_context_description() {
    let ctx = ConnectionContext::new(Some("127.0.0.1:5000".parse().unwrap()), CancellationToken::new());
    assert!(ctx.to_string().contains("from 127.0.0.1:5000"));

    ctx.record_request("GET", "/ws/locations/");
    ctx.record_request("GET", "/ignored");
    assert_eq!(ctx.request(), Some("GET /ws/locations/"));
    assert!(ctx.to_string().starts_with("GET /ws/locations/ (conn-"));
}
