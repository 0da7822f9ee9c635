//! Hub engine
//!
//! Fan-out is non-blocking: every delivery is a `try_send` into the
//! subscriber's bounded queue, so a stalled connection can only lose its own
//! events and never delays the others.
//!
//! Consistency between the registry and the subscriber table relies on two
//! orderings:
//! - sessions `register` before they `join`, and `leave` before they
//!   `unregister`;
//! - `publish` takes its membership snapshot while holding the subscriber
//!   table read lock.
//!
//! Together these make "member without a registered subscriber" impossible.
//! If it is ever observed, `publish` reports `Error::OrphanedSubscribers`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, error, warn};

use crate::client::{DeliveryStatus, Subscriber, SubscriberHandle};
use crate::hub::event::LocationEvent;
use crate::registry::GroupRegistry;
use crate::utils::{Error, Result};

/// Per-publish delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub queued: usize,
    pub lagged: usize,
    pub closed: usize,
}

impl Delivery {
    pub fn recipients(&self) -> usize {
        self.queued + self.lagged + self.closed
    }
}

#[derive(Debug)]
pub struct BroadcastHub {
    registry: Arc<GroupRegistry>,
    subscribers: RwLock<HashMap<SubscriberHandle, Subscriber>>,
    max_subscribers: usize,
}

impl BroadcastHub {
    pub fn new(registry: Arc<GroupRegistry>, max_subscribers: usize) -> Self {
        Self {
            registry,
            subscribers: RwLock::new(HashMap::new()),
            max_subscribers,
        }
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    /// Make a subscriber's queue reachable by its handle.
    pub fn register(&self, subscriber: Subscriber) -> Result<()> {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if subscribers.len() >= self.max_subscribers {
            return Err(Error::CapacityReached {
                limit: self.max_subscribers,
            });
        }
        subscribers.insert(subscriber.handle, subscriber);
        Ok(())
    }

    pub fn unregister(&self, handle: &SubscriberHandle) -> Option<Subscriber> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver `event` to every current member of `topic`.
    ///
    /// A full or closed queue only affects that subscriber and is reported in
    /// the returned `Delivery`. The only error is a broken registry
    /// invariant, reported after all valid members have been served.
    pub fn publish(&self, topic: &str, event: LocationEvent) -> Result<Delivery> {
        let location_id = event.diagnostic_id().map(|id| id.to_string());
        let event = Arc::new(event);
        let mut delivery = Delivery::default();
        let mut orphans = Vec::new();

        {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            for handle in self.registry.members(topic) {
                let Some(subscriber) = subscribers.get(&handle) else {
                    orphans.push(handle);
                    continue;
                };
                match subscriber.deliver(event.clone()) {
                    DeliveryStatus::Queued => delivery.queued += 1,
                    DeliveryStatus::Lagged => {
                        delivery.lagged += 1;
                        warn!(
                            %handle,
                            topic,
                            dropped = subscriber.dropped(),
                            "subscriber queue full, dropping event"
                        );
                    }
                    DeliveryStatus::Closed => {
                        delivery.closed += 1;
                        debug!(%handle, topic, "subscriber queue closed");
                    }
                }
            }
        }

        debug!(
            topic,
            location_id = location_id.as_deref().unwrap_or("<none>"),
            queued = delivery.queued,
            lagged = delivery.lagged,
            closed = delivery.closed,
            "published location event"
        );

        if orphans.is_empty() {
            Ok(delivery)
        } else {
            error!(topic, ?orphans, "topic members without a registered subscriber");
            Err(Error::OrphanedSubscribers {
                topic: topic.to_string(),
                count: orphans.len(),
            })
        }
    }
}
