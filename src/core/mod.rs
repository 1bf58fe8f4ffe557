//! Runtime core: tree model, processor loop, restart planner, entry point.
//!
//! The only public API from this module is the [`Supervisor`] handle (and
//! its builder) plus the [`NodeState`] enum exposed to metrics observers.
//!
//! Internal modules:
//! - [`tree`]: the node/tree data model and state machine;
//! - [`processor`]: the single tree-mutation loop and the liquidator;
//! - [`planner`]: the three-phase restart planner;
//! - [`supervisor`]: construction, options and the external handle.

pub(crate) mod planner;
pub(crate) mod processor;
pub(crate) mod supervisor;
pub(crate) mod tree;

pub use supervisor::{Supervisor, SupervisorBuilder};
pub use tree::NodeState;
