//! The `error` module defines the error type used across `trackcast`.
//!
//! Transport faults and peer disconnects are expected and are handled close
//! to where they happen. Only `Cancelled(Shutdown)`, configuration problems
//! and broken hub invariants are meant to travel up to the binary.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why an in-flight connection handler stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The remote peer went away while the handler was running.
    PeerDisconnected,
    /// The process is shutting down.
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::PeerDisconnected => f.write_str("peer disconnected"),
            CancelReason::Shutdown => f.write_str("server shutting down"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("subscriber limit of {limit} reached")]
    CapacityReached { limit: usize },

    /// A topic member had no registered subscriber. Cleanup ordering should
    /// make this impossible, so it is reported rather than ignored.
    #[error("{count} member(s) of topic '{topic}' have no registered subscriber")]
    OrphanedSubscribers { topic: String, count: usize },
}

impl Error {
    pub fn is_peer_disconnect(&self) -> bool {
        matches!(self, Error::Cancelled(CancelReason::PeerDisconnected))
    }
}
