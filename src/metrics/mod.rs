//! Metrics collaborator: node state observers.
//!
//! Every node state transition is reported to a list of [`Metrics`]
//! observers via [`Metrics::notify_node_state`] — synchronously, exactly
//! once per transition, serialized under the tree lock (never concurrently).
//!
//! Two reference observers ship with the crate:
//! - [`InMemoryMetrics`] — keeps the latest state per DN; handy in tests
//!   and status endpoints.
//! - [`StateCounters`] — counts transitions into each state; the
//!   counter/gauge-style exporter.
//!
//! ## Implementing a custom observer
//! ```rust
//! use treevisor::{Metrics, NodeState};
//!
//! struct Printer;
//!
//! impl Metrics for Printer {
//!     fn notify_node_state(&self, dn: &str, state: NodeState) {
//!         println!("{dn} -> {state}");
//!     }
//! }
//! ```

mod counters;
mod in_memory;
mod observer;

pub use counters::StateCounters;
pub use in_memory::InMemoryMetrics;
pub use observer::Metrics;
pub(crate) use observer::MetricsSet;
