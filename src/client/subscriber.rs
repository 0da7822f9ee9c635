use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::hub::LocationEvent;

/// Opaque identifier for one live connection.
///
/// Generated when the connection is accepted and retired when it closes.
/// Handles are random v4 UUIDs and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle(Uuid);

impl SubscriberHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What happened to a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Queued,
    /// The queue was full; the event is dropped for this subscriber.
    Lagged,
    /// The session has stopped draining its queue.
    Closed,
}

/// Represents a connected client as seen by the broadcast hub.
#[derive(Debug)]
pub struct Subscriber {
    pub handle: SubscriberHandle,
    sender: mpsc::Sender<Arc<LocationEvent>>,
    dropped: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber with a bounded queue of `capacity` events and
    /// return it together with the receiving end of that queue.
    pub fn channel(
        handle: SubscriberHandle,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Arc<LocationEvent>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            handle,
            sender,
            dropped: AtomicU64::new(0),
        };
        (subscriber, receiver)
    }

    /// Hand an event to the session without waiting.
    pub fn deliver(&self, event: Arc<LocationEvent>) -> DeliveryStatus {
        match self.sender.try_send(event) {
            Ok(()) => DeliveryStatus::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                DeliveryStatus::Lagged
            }
            Err(TrySendError::Closed(_)) => DeliveryStatus::Closed,
        }
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
