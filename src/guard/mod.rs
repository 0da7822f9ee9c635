//! Disconnect guard
//!
//! Every inbound connection handler runs inside [`disconnect_guard`]. When
//! the remote peer vanishes while the handler is in flight, the handler is
//! cancelled (its future is dropped, which runs the session's cleanup) and
//! the outcome is downgraded to [`Guarded::Disconnected`] with a single
//! debug line. Any other failure, including shutdown cancellation, is
//! returned untouched.
//!
//! The peer-disconnect signal is the connection's own `disconnect` token, or
//! an `Error::Cancelled(PeerDisconnected)` returned by the handler. The
//! process-wide `shutdown` token is never absorbed here.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::SubscriberHandle;
use crate::utils::{CancelReason, Error, Result};

/// Per-connection context shared by the accept loop, the handshake and the
/// session.
#[derive(Debug)]
pub struct ConnectionContext {
    handle: SubscriberHandle,
    peer: Option<SocketAddr>,
    request: OnceLock<String>,
    disconnect: CancellationToken,
    shutdown: CancellationToken,
}

impl ConnectionContext {
    /// `shutdown` is the process-wide token; the disconnect token is fresh
    /// and belongs to this connection only.
    pub fn new(peer: Option<SocketAddr>, shutdown: CancellationToken) -> Self {
        Self {
            handle: SubscriberHandle::new(),
            peer,
            request: OnceLock::new(),
            disconnect: CancellationToken::new(),
            shutdown,
        }
    }

    pub fn handle(&self) -> SubscriberHandle {
        self.handle
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Remember the request line of the handshake. Only the first call wins.
    pub fn record_request(&self, method: &str, path: &str) {
        let _ = self.request.set(format!("{method} {path}"));
    }

    pub fn request(&self) -> Option<&str> {
        self.request.get().map(String::as_str)
    }

    /// Fired when the peer is known to be gone.
    pub fn disconnect(&self) -> &CancellationToken {
        &self.disconnect
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}

impl fmt::Display for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.request(), self.peer) {
            (Some(request), _) => write!(f, "{request} ({})", self.handle),
            (None, Some(peer)) => write!(f, "connection {} from {peer}", self.handle),
            (None, None) => write!(f, "connection {}", self.handle),
        }
    }
}

/// Outcome of a guarded handler.
#[derive(Debug, PartialEq, Eq)]
pub enum Guarded<T> {
    Completed(T),
    /// The peer disconnected mid-flight; nothing further to report.
    Disconnected,
}

/// Run `handler`, absorbing cancellation caused by the peer disconnecting.
pub async fn disconnect_guard<F, T>(ctx: &ConnectionContext, handler: F) -> Result<Guarded<T>>
where
    F: Future<Output = Result<T>>,
{
    let outcome = tokio::select! {
        biased;
        result = handler => result,
        _ = ctx.disconnect.cancelled() => Err(Error::Cancelled(CancelReason::PeerDisconnected)),
    };

    match outcome {
        Ok(value) => Ok(Guarded::Completed(value)),
        Err(err) if err.is_peer_disconnect() => {
            debug!(conn = %ctx.handle, "Client disconnected during {ctx}");
            Ok(Guarded::Disconnected)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests;
