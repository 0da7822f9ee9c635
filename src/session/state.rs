/// Lifecycle of one connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame received or the stream ended cleanly.
    ClientClosed,
    /// Reading from the transport failed for a reason other than the peer
    /// vanishing (for example a protocol violation).
    TransportError,
    /// Writing a frame failed.
    WriteFailed,
    /// The delivery queue was closed from the hub side.
    QueueClosed,
    /// The hub was at capacity; the client got a 1013 close frame.
    Rejected,
    /// The WebSocket handshake did not complete.
    HandshakeFailed,
    /// The client did not finish the upgrade request in time.
    HandshakeTimedOut,
}
