use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::client::SubscriberHandle;
use crate::hub::BroadcastHub;
use crate::session::state::SessionState;

/// Owns a session's topic memberships and hub registration.
///
/// Releasing leaves every joined topic and then unregisters the subscriber,
/// moving the session through `Closing` to `Closed`. Release runs at most
/// once and also runs on drop, so a session future cancelled mid-flight
/// still cleans up.
#[derive(Debug)]
pub struct Membership {
    hub: Arc<BroadcastHub>,
    handle: SubscriberHandle,
    topics: Vec<String>,
    state: watch::Sender<SessionState>,
    released: bool,
}

impl Membership {
    pub fn new(
        hub: Arc<BroadcastHub>,
        handle: SubscriberHandle,
        state: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            hub,
            handle,
            topics: Vec::new(),
            state,
            released: false,
        }
    }

    pub fn join(&mut self, topic: &str) {
        self.hub.registry().join(topic, self.handle);
        if !self.topics.iter().any(|t| t == topic) {
            self.topics.push(topic.to_string());
        }
    }

    pub fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        debug!(handle = %self.handle, ?previous, ?next, "session state");
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.set_state(SessionState::Closing);

        for topic in self.topics.drain(..) {
            self.hub.registry().leave(&topic, &self.handle);
        }
        self.hub.unregister(&self.handle);

        self.set_state(SessionState::Closed);
        info!(handle = %self.handle, "WebSocket session closed");
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.release();
    }
}
