//! Connection session
//!
//! One `Session` drives one WebSocket connection through
//! `Connecting -> Open -> Closing -> Closed`:
//! - connecting: register the delivery queue with the hub, join the topic,
//!   write the welcome frame straight to the socket;
//! - open: read until the client closes, drain the queue onto the socket,
//!   and watch for shutdown, all at once;
//! - closing/closed: handled by [`Membership`], which always runs.
//!
//! Abrupt loss of the peer is reported as
//! `Error::Cancelled(PeerDisconnected)` after firing the connection's
//! disconnect token, for the disconnect guard to absorb.

pub mod membership;
pub mod state;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};
use tungstenite::Error as WsError;
use tungstenite::error::ProtocolError;
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::client::{Subscriber, SubscriberHandle};
use crate::config::{HubSettings, ServerStartup};
use crate::guard::ConnectionContext;
use crate::hub::{BroadcastHub, LocationEvent};
use crate::transport::message::ServerMessage;
use crate::utils::{CancelReason, Error, Result};

pub use membership::Membership;
pub use state::{CloseReason, SessionState};

/// How long a closing session waits for its close frame to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct Session {
    handle: SubscriberHandle,
    hub: Arc<BroadcastHub>,
    startup: ServerStartup,
    topic: String,
    queue_capacity: usize,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(
        handle: SubscriberHandle,
        hub: Arc<BroadcastHub>,
        startup: ServerStartup,
        settings: &HubSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Connecting);
        Self {
            handle,
            hub,
            startup,
            topic: settings.topic.clone(),
            queue_capacity: settings.queue_capacity,
            state,
        }
    }

    pub fn handle(&self) -> SubscriberHandle {
        self.handle
    }

    /// Follow the session's state transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn run<S>(self, ws: S, ctx: &ConnectionContext) -> Result<CloseReason>
    where
        S: Stream<Item = std::result::Result<WsMessage, WsError>>
            + Sink<WsMessage, Error = WsError>
            + Unpin,
    {
        let Session {
            handle,
            hub,
            startup,
            topic,
            queue_capacity,
            state,
        } = self;
        let (mut sink, mut stream) = ws.split();
        let mut membership = Membership::new(hub.clone(), handle, state);

        let (subscriber, mut queue) = Subscriber::channel(handle, queue_capacity);
        if let Err(err) = hub.register(subscriber) {
            warn!(%handle, error = %err, "rejecting WebSocket client");
            membership.release();
            close_with(&mut sink, CloseCode::Again, "server at capacity").await;
            return Ok(CloseReason::Rejected);
        }
        membership.join(&topic);

        let welcome = ServerMessage::Welcome {
            server_startup: startup,
        }
        .to_ws()?;
        if let Err(err) = sink.send(welcome).await {
            return transport_fault(err, CloseReason::WriteFailed, ctx);
        }
        membership.set_state(SessionState::Open);
        info!(%handle, topic = %topic, "WebSocket client connected");

        let outcome = tokio::select! {
            read = receive_direction(&mut stream, handle) => {
                read.or_else(|err| transport_fault(err, CloseReason::TransportError, ctx))
            }
            written = send_direction(&mut sink, &mut queue, handle) => {
                written.or_else(|err| transport_fault(err, CloseReason::WriteFailed, ctx))
            }
            _ = ctx.shutdown().cancelled() => Err(Error::Cancelled(CancelReason::Shutdown)),
        };

        membership.release();
        match &outcome {
            Ok(CloseReason::ClientClosed) => {
                // Flushes the reply to the client's close frame.
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
            }
            Err(Error::Cancelled(CancelReason::Shutdown)) => {
                close_with(&mut sink, CloseCode::Away, "server shutting down").await;
            }
            _ => {}
        }
        outcome
    }
}

async fn receive_direction<St>(
    stream: &mut St,
    handle: SubscriberHandle,
) -> std::result::Result<CloseReason, WsError>
where
    St: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        match msg? {
            WsMessage::Close(frame) => {
                debug!(%handle, ?frame, "close frame received");
                return Ok(CloseReason::ClientClosed);
            }
            WsMessage::Text(_) | WsMessage::Binary(_) => {
                trace!(%handle, "ignoring inbound data frame");
            }
            _ => {}
        }
    }
    Ok(CloseReason::ClientClosed)
}

async fn send_direction<Si>(
    sink: &mut Si,
    queue: &mut mpsc::Receiver<Arc<LocationEvent>>,
    handle: SubscriberHandle,
) -> std::result::Result<CloseReason, WsError>
where
    Si: Sink<WsMessage, Error = WsError> + Unpin,
{
    while let Some(event) = queue.recv().await {
        let frame = match ServerMessage::location(&event).to_ws() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%handle, error = %err, "failed to serialize location event");
                continue;
            }
        };
        let location_id = event.diagnostic_id().map(|id| id.to_string());
        debug!(
            %handle,
            location_id = location_id.as_deref().unwrap_or("<none>"),
            "sending location update to WebSocket client"
        );
        sink.send(frame).await?;
    }
    Ok(CloseReason::QueueClosed)
}

/// Maps a transport error to a session outcome. A vanished peer fires the
/// disconnect token and becomes a cancellation; anything else ends the
/// session with `fallback`.
fn transport_fault(
    err: WsError,
    fallback: CloseReason,
    ctx: &ConnectionContext,
) -> Result<CloseReason> {
    if is_peer_disconnect(&err) {
        ctx.disconnect().cancel();
        Err(Error::Cancelled(CancelReason::PeerDisconnected))
    } else {
        debug!(handle = %ctx.handle(), error = %err, ?fallback, "transport fault");
        Ok(fallback)
    }
}

/// Whether `err` means the remote end went away without a closing handshake.
pub fn is_peer_disconnect(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

async fn close_with<Si>(sink: &mut Si, code: CloseCode, reason: &'static str)
where
    Si: Sink<WsMessage, Error = WsError> + Unpin,
{
    let frame = WsMessage::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }));
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(frame)).await;
}

#[cfg(test)]
mod tests;
