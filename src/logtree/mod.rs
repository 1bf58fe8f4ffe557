//! Logging collaborator: a DN-keyed log tree.
//!
//! The supervision runtime routes log output by node identity: every node
//! gets a [`Logger`] scoped to its distinguished name (`root.foo.bar`), and
//! sub-loggers may claim additional names below a node (which then become
//! unavailable as child runnable names). The runtime never interprets log
//! content — it only routes entries by DN into the [`LogTree`].
//!
//! The tree is a bounded in-memory store; consumers read entries back per
//! DN or per subtree. A caller may supply its own tree at supervisor
//! construction to share one hierarchy across subsystems.

mod logger;
mod tree;

pub use logger::Logger;
pub use tree::{LogEntry, LogTree, Severity};
