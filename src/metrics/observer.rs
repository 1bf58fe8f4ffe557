//! # Observer trait and fan-out set.

use std::sync::Arc;

use crate::core::NodeState;

/// Contract for node state observers.
///
/// Called synchronously from inside the runtime's tree lock, exactly once
/// per state transition and never concurrently. Implementations must not
/// block and must not call back into the supervisor.
pub trait Metrics: Send + Sync + 'static {
    /// Reports that the node at `dn` transitioned into `state`.
    fn notify_node_state(&self, dn: &str, state: NodeState);
}

/// Fan-out over the configured observers.
///
/// Delivery is inline and in registration order; the serialization
/// guarantee comes from the caller holding the tree lock.
pub(crate) struct MetricsSet {
    observers: Vec<Arc<dyn Metrics>>,
}

impl MetricsSet {
    pub(crate) fn new(observers: Vec<Arc<dyn Metrics>>) -> Self {
        Self { observers }
    }

    pub(crate) fn notify_node_state(&self, dn: &str, state: NodeState) {
        for observer in &self.observers {
            observer.notify_node_state(dn, state);
        }
    }
}
