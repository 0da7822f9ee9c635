//! Broadcast hub
//!
//! The hub turns one published `LocationEvent` into one queued delivery per
//! current member of a topic. It owns the table of registered subscribers
//! (handle -> bounded queue) and shares the `GroupRegistry` with sessions.

pub mod engine;
pub mod event;

pub use engine::{BroadcastHub, Delivery};
pub use event::{EventId, LocationEvent};
