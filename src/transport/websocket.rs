//! WebSocket transport
//!
//! Accepts TCP connections, performs the WebSocket handshake and runs one
//! [`Session`] per connection inside the disconnect guard. The accept loop
//! stops when the shutdown token fires; in-flight connections are then given
//! `server.shutdown_grace_secs` to close.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use tungstenite::Error as WsError;
use tungstenite::error::ProtocolError;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};

use crate::config::{HubSettings, ServerStartup, Settings};
use crate::guard::{ConnectionContext, Guarded, disconnect_guard};
use crate::hub::BroadcastHub;
use crate::session::{CloseReason, Session, is_peer_disconnect};
use crate::utils::{CancelReason, Error, Result};

/// Back-off after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    Ok(TcpListener::bind((host, port)).await?)
}

pub async fn serve(
    listener: TcpListener,
    hub: Arc<BroadcastHub>,
    startup: ServerStartup,
    settings: Settings,
    shutdown: CancellationToken,
) -> Result<()> {
    let local = listener.local_addr()?;
    info!("WebSocket server listening on ws://{local}");

    let tracker = TaskTracker::new();
    let hub_settings = Arc::new(settings.hub);
    let handshake_timeout = Duration::from_secs(settings.server.handshake_timeout_secs);

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let hub = hub.clone();
        let hub_settings = hub_settings.clone();
        let ctx = ConnectionContext::new(Some(peer), shutdown.clone());

        tracker.spawn(async move {
            let outcome = disconnect_guard(
                &ctx,
                handle_connection(stream, &ctx, hub, startup, &hub_settings, handshake_timeout),
            )
            .await;
            report(&ctx, outcome);
        });
    }

    tracker.close();
    info!(connections = tracker.len(), "WebSocket server stopping");
    let grace = Duration::from_secs(settings.server.shutdown_grace_secs);
    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        warn!("shutdown timed out after {grace:?}, some connections may still be open");
    }
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    ctx: &ConnectionContext,
    hub: Arc<BroadcastHub>,
    startup: ServerStartup,
    settings: &HubSettings,
    handshake_timeout: Duration,
) -> Result<CloseReason> {
    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        ctx.record_request(request.method().as_str(), request.uri().path());
        Ok(response)
    };

    let accept = accept_hdr_async(stream, callback);
    let handshake = match tokio::time::timeout(handshake_timeout, accept).await {
        Ok(handshake) => handshake,
        Err(_) => {
            warn!(conn = %ctx, timeout = ?handshake_timeout, "WebSocket handshake timed out");
            return Ok(CloseReason::HandshakeTimedOut);
        }
    };

    let ws = match handshake {
        Ok(ws) => ws,
        Err(err) if is_peer_disconnect(&err) || handshake_interrupted(&err) => {
            ctx.disconnect().cancel();
            return Err(Error::Cancelled(CancelReason::PeerDisconnected));
        }
        Err(err) => {
            warn!(conn = %ctx, error = %err, "WebSocket handshake error");
            return Ok(CloseReason::HandshakeFailed);
        }
    };

    Session::new(ctx.handle(), hub, startup, settings)
        .run(ws, ctx)
        .await
}

/// The peer closed the socket before sending a complete upgrade request.
fn handshake_interrupted(err: &WsError) -> bool {
    matches!(err, WsError::Protocol(ProtocolError::HandshakeIncomplete))
}

fn report(ctx: &ConnectionContext, outcome: Result<Guarded<CloseReason>>) {
    match outcome {
        Ok(Guarded::Completed(reason)) => debug!(conn = %ctx, ?reason, "connection finished"),
        Ok(Guarded::Disconnected) => {}
        Err(Error::Cancelled(CancelReason::Shutdown)) => {
            debug!(conn = %ctx, "connection closed for shutdown")
        }
        Err(err) => error!(conn = %ctx, error = %err, "connection handler failed"),
    }
}
