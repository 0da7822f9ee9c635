//! A single topic's membership set.
//!
//! Callers synchronize access through the owning `GroupRegistry`.

use std::collections::HashSet;

use crate::client::SubscriberHandle;

#[derive(Debug, Default)]
pub struct Group {
    pub name: String,
    pub members: HashSet<SubscriberHandle>,
}

impl Group {
    /// Create an empty group with the given topic name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            members: HashSet::new(),
        }
    }

    /// Add a member. Duplicate joins are ignored.
    pub fn join(&mut self, handle: SubscriberHandle) -> bool {
        self.members.insert(handle)
    }

    /// Remove a member.
    pub fn leave(&mut self, handle: &SubscriberHandle) -> bool {
        self.members.remove(handle)
    }

    pub fn contains(&self, handle: &SubscriberHandle) -> bool {
        self.members.contains(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
