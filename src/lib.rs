//! # trackcast
//!
//! `trackcast` is the real-time distribution layer of a location tracker.
//! Clients hold a WebSocket open; every location event handed to the hub is
//! pushed to all of them as soon as it arrives.
//!
//! ## Core Modules
//!
//! - `registry`: per-topic membership sets of connected subscribers.
//! - `client`: subscriber handles and their bounded delivery queues.
//! - `hub`: fans a published event out to every member of a topic.
//! - `session`: the lifecycle of a single WebSocket connection.
//! - `guard`: absorbs cancellation caused by clients disconnecting mid-flight.
//! - `transport`: wire frames and the WebSocket accept loop.
//! - `ingest`: reads JSON-lines location events and publishes them.
//! - `config`: settings, the runtime port record and the startup timestamp.
//! - `utils`: error type and logging setup.

pub mod client;
pub mod config;
pub mod guard;
pub mod hub;
pub mod ingest;
pub mod registry;
pub mod session;
pub mod transport;
pub mod utils;
