//! # InMemoryMetrics — latest state per DN.
//!
//! Maintains an in-memory map from distinguished name to the most recently
//! reported [`NodeState`]. Useful for tests ("wait until `root.one` is
//! healthy") and for status/debug endpoints.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::NodeState;

use super::observer::Metrics;

/// Tracks the latest reported state of every node.
#[derive(Default)]
pub struct InMemoryMetrics {
    inner: RwLock<HashMap<String, NodeState>>,
}

impl InMemoryMetrics {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all known DNs and their latest states.
    #[must_use]
    pub fn dns(&self) -> HashMap<String, NodeState> {
        self.inner.read().clone()
    }

    /// Returns the latest state reported for `dn`, if any.
    #[must_use]
    pub fn state_of(&self, dn: &str) -> Option<NodeState> {
        self.inner.read().get(dn).copied()
    }
}

impl Metrics for InMemoryMetrics {
    fn notify_node_state(&self, dn: &str, state: NodeState) {
        self.inner.write().insert(dn.to_owned(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_state_wins() {
        let m = InMemoryMetrics::new();
        m.notify_node_state("root.one", NodeState::New);
        m.notify_node_state("root.one", NodeState::Healthy);

        assert_eq!(m.state_of("root.one"), Some(NodeState::Healthy));
        assert_eq!(m.state_of("root.two"), None);
        assert_eq!(m.dns().len(), 1);
    }
}
