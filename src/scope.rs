//! # Scope: the context handed to every runnable.
//!
//! A [`Scope`] ties a running task to its node in the supervision tree. It
//! is the runnable-facing API surface:
//!
//! - spawn supervised children ([`Scope::run`], [`Scope::run_group`]) —
//!   only during setup, before signaling healthy;
//! - report lifecycle progress ([`Scope::signal`]);
//! - obtain DN-scoped loggers ([`Scope::logger`], [`Scope::sub_logger`]);
//! - observe cancellation ([`Scope::cancelled`], [`Scope::is_cancelled`]).
//!
//! The scope is live for as long as the runnable should keep running. When
//! it is canceled — because the runnable's group failed, an ancestor is
//! being restarted, or the whole tree is shutting down — the runnable must
//! stop promptly and return [`RunnableError::Canceled`]. Cancellation is
//! advisory: the runtime never forcibly kills a task that ignores it.
//!
//! ## Example
//! ```rust
//! use treevisor::{RunnableError, RunnableFn, RunnableRef, Scope, Signal};
//!
//! let server: RunnableRef = RunnableFn::arc(|scope: Scope| async move {
//!     // Setup: spawn children before signaling healthy.
//!     scope.run("worker", RunnableFn::arc(|scope: Scope| async move {
//!         scope.signal(Signal::Healthy);
//!         scope.cancelled().await;
//!         Err(RunnableError::Canceled)
//!     }))?;
//!
//!     scope.signal(Signal::Healthy);
//!     scope.logger().info("serving");
//!     scope.cancelled().await;
//!     Err(RunnableError::Canceled)
//! });
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::supervisor::Shared;
use crate::core::tree;
use crate::error::SpawnError;
use crate::logtree::Logger;
use crate::runnables::RunnableRef;

/// Lifecycle signals a runnable sends on its own behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The runnable is healthy: done with setup, done with spawning child
    /// runnables, and ready to serve in a loop. It still needs to watch its
    /// scope and exit when canceled.
    Healthy,
    /// The runnable is done — it does not need to run any loop. Useful for
    /// runnables that only set up children. The node will still be
    /// restarted if a related failure happens somewhere in the tree.
    Done,
}

/// Handle binding a running task to its node in the supervision tree.
///
/// Cheap to clone; clones refer to the same node. A scope only stays
/// meaningful for the node incarnation it was created for — after a
/// restart, the replacement task gets a fresh scope.
#[derive(Clone)]
pub struct Scope {
    pub(crate) shared: Arc<Shared>,
    pub(crate) dn: Arc<str>,
    pub(crate) cancel: CancellationToken,
}

impl Scope {
    /// Starts a single child runnable in its own supervision group.
    pub fn run(&self, name: impl Into<String>, runnable: RunnableRef) -> Result<(), SpawnError> {
        self.run_group(vec![(name.into(), runnable)])
    }

    /// Starts a set of child runnables as one supervision group.
    ///
    /// Group members run together: if any one of them dies unexpectedly,
    /// the rest are canceled and the whole group is later restarted as a
    /// unit.
    ///
    /// May only be called while this node is still setting up (before
    /// [`Signal::Healthy`]). Names must be non-empty `[a-z0-9_]{1,64}`,
    /// not collide with existing children or reserved names, and not
    /// repeat within the call; any violation fails the whole call without
    /// creating a node.
    pub fn run_group(
        &self,
        entries: Vec<(String, RunnableRef)>,
    ) -> Result<(), SpawnError> {
        let dns = {
            let mut tree = self.shared.tree.lock();
            let dns = tree.run_group(&self.dn, entries)?;
            for dn in &dns {
                self.shared.metrics.notify_node_state(dn, tree::NodeState::New);
            }
            dns
        };

        // Hand the schedule requests to the processor without holding the
        // tree lock; the queue provides backpressure.
        let tx = self.shared.req_tx.clone();
        tokio::spawn(async move {
            for dn in dns {
                let _ = tx
                    .send(crate::core::processor::Request::Schedule { dn })
                    .await;
            }
        });
        Ok(())
    }

    /// Tells the supervisor this runnable reached a lifecycle point.
    ///
    /// [`Signal::Healthy`] must be sent exactly once, from state New;
    /// [`Signal::Done`] at most once after that, while healthy. Signaling
    /// out of sequence is a programming error and panics — the panic
    /// unwinds through the runnable and is trapped by the runtime, which
    /// treats it like any other unexpected death.
    pub fn signal(&self, signal: Signal) {
        let outcome = {
            let mut tree = self.shared.tree.lock();
            match tree.signal(&self.dn, signal) {
                Ok(Some(state)) => {
                    self.shared.metrics.notify_node_state(&self.dn, state);
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(violation) => Err(violation),
            }
        };
        if let Err(violation) = outcome {
            panic!("{violation}");
        }
    }

    /// Returns a logger scoped to this node's distinguished name.
    #[must_use]
    pub fn logger(&self) -> Logger {
        self.shared.logs.leveled_for(self.dn.clone())
    }

    /// Returns a logger for `{dn}.{name}` and reserves `name` so it can
    /// never collide with a child runnable name (no runnable and
    /// sub-logger may ever log to the same DN). Fails if the name is
    /// invalid, already reserved, or used by a child.
    pub fn sub_logger(&self, name: &str) -> Result<Logger, SpawnError> {
        let mut tree = self.shared.tree.lock();
        tree.reserve(&self.dn, name)?;
        Ok(self.shared.logs.leveled_for(format!("{}.{}", self.dn, name)))
    }

    /// This node's distinguished name (`root.foo.bar`).
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Completes once this scope is canceled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// True once this scope has been canceled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The underlying cancellation token, for composing with `select!` or
    /// deriving ad-hoc sub-tokens.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
