//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It defines the frames the server pushes to clients and implements the
//! accept loop that hands each connection to a guarded session.

pub mod message;
pub mod websocket;

pub use message::ServerMessage;
pub use websocket::{bind, serve};
