//! Group registry
//!
//! Tracks, for every named topic, the set of subscriber handles currently
//! joined to it. The registry is the only shared membership state in the
//! process: sessions mutate it on connect and disconnect, the hub reads
//! snapshots of it on every publish.
//!
//! All operations take `&self` and are safe to call from any task. A topic
//! exists only while it has members; leaving the last member drops it.

pub mod group;

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use tracing::trace;

use crate::client::SubscriberHandle;
pub use group::Group;

#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Group>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` to `topic`, creating the topic if needed.
    ///
    /// Returns `false` when the handle was already a member.
    pub fn join(&self, topic: &str, handle: SubscriberHandle) -> bool {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let added = groups
            .entry(topic.to_string())
            .or_insert_with(|| Group::new(topic))
            .join(handle);
        trace!(%handle, topic, added, "join");
        added
    }

    /// Removes `handle` from `topic`. Unknown topics and repeated leaves are
    /// no-ops. Returns `true` only if the handle was actually removed.
    pub fn leave(&self, topic: &str, handle: &SubscriberHandle) -> bool {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let Some(group) = groups.get_mut(topic) else {
            return false;
        };
        let removed = group.leave(handle);
        if group.is_empty() {
            groups.remove(topic);
        }
        trace!(%handle, topic, removed, "leave");
        removed
    }

    /// Point-in-time copy of the members of `topic`.
    pub fn members(&self, topic: &str) -> HashSet<SubscriberHandle> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        groups
            .get(topic)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    /// Every topic `handle` currently belongs to.
    pub fn topics_of(&self, handle: &SubscriberHandle) -> Vec<String> {
        let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
        groups
            .values()
            .filter(|g| g.contains(handle))
            .map(|g| g.name.clone())
            .collect()
    }

    pub fn topic_count(&self) -> usize {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
