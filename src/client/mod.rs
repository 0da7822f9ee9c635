//! The `client` module defines how a connected client is seen by the hub.
//!
//! A `Subscriber` pairs the connection's `SubscriberHandle` with the sending
//! side of its bounded delivery queue. The receiving side is owned by the
//! connection's session, which drains it onto the WebSocket.

pub mod subscriber;
pub use subscriber::{DeliveryStatus, Subscriber, SubscriberHandle};
