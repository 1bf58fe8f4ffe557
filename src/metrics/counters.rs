//! # StateCounters — transition counters per state.
//!
//! Counts how many times nodes entered each state across the whole tree.
//! The counters are monotonic and cheap to read, suitable for export into
//! a process-wide metrics registry.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::NodeState;

use super::observer::Metrics;

/// Monotonic per-state transition counters.
#[derive(Default)]
pub struct StateCounters {
    new: AtomicU64,
    healthy: AtomicU64,
    dead: AtomicU64,
    done: AtomicU64,
    canceled: AtomicU64,
}

impl StateCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transitions into `state` observed so far.
    #[must_use]
    pub fn count(&self, state: NodeState) -> u64 {
        self.cell(state).load(Ordering::Relaxed)
    }

    fn cell(&self, state: NodeState) -> &AtomicU64 {
        match state {
            NodeState::New => &self.new,
            NodeState::Healthy => &self.healthy,
            NodeState::Dead => &self.dead,
            NodeState::Done => &self.done,
            NodeState::Canceled => &self.canceled,
        }
    }
}

impl Metrics for StateCounters {
    fn notify_node_state(&self, _dn: &str, state: NodeState) {
        self.cell(state).fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_per_state() {
        let c = StateCounters::new();
        c.notify_node_state("root", NodeState::New);
        c.notify_node_state("root.a", NodeState::New);
        c.notify_node_state("root.a", NodeState::Dead);

        assert_eq!(c.count(NodeState::New), 2);
        assert_eq!(c.count(NodeState::Dead), 1);
        assert_eq!(c.count(NodeState::Healthy), 0);
    }
}
