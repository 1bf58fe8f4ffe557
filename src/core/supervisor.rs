//! # Supervisor: entry point and external handle.
//!
//! [`Supervisor`] owns a supervision tree. Constructing one (via
//! [`Supervisor::spawn`] or [`SupervisorBuilder::spawn`]) creates the root
//! node for the given root runnable, starts the processor task, and
//! enqueues the initial schedule request. From there the tree runs itself:
//! the root runnable spawns children through its [`Scope`](crate::Scope),
//! failures are contained to their groups, and dead subtrees are restarted
//! with capped backoff — indefinitely, until the supervisor is shut down.
//!
//! ## High-level architecture
//! ```text
//! Supervisor::spawn(root)
//!   ├─ Tree { root node }          (one coarse lock)
//!   ├─ mpsc request queue (cap 1)  (all mutations funneled through it)
//!   └─ Processor task
//!        ├─ Schedule  → spawn runnable task, trap panics
//!        ├─ Died      → state machine + group cancellation
//!        ├─ tick      → restart planner (when dirty)
//!        └─ top token canceled → kill + liquidate, then exit
//!
//! Supervisor handle:
//!   shutdown()  → cancel top-level scope
//!   settled()   → resolve once the tree has been quiet for a while
//!   wait()      → join the processor (returns after liquidation)
//!   log_tree()  → the DN-keyed log hierarchy
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::processor::{Processor, Request};
use crate::core::tree::{NodeState, Tree, ROOT_DN};
use crate::logtree::{LogTree, Logger};
use crate::metrics::{Metrics, MetricsSet};
use crate::runnables::RunnableRef;

/// State shared between the supervisor handle, the processor task, and
/// every scope handed to a runnable.
pub(crate) struct Shared {
    /// The supervision tree, behind the one coarse lock.
    pub(crate) tree: Mutex<Tree>,
    /// Sender side of the processor's request queue.
    pub(crate) req_tx: mpsc::Sender<Request>,
    /// DN-keyed log hierarchy (internally created or caller-supplied).
    pub(crate) logs: LogTree,
    /// Observers notified of every node state transition.
    pub(crate) metrics: MetricsSet,
    /// Runtime tuning knobs.
    pub(crate) config: Config,
    /// Don't trap runnable panics; for tests that want faults to surface.
    pub(crate) propagate_panic: bool,
}

impl Shared {
    /// The supervisor's own logger, at the `supervisor` DN.
    pub(crate) fn ilogger(&self) -> Logger {
        self.logs.leveled_for("supervisor")
    }
}

/// Builder for a [`Supervisor`] with optional features.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Config,
    propagate_panic: bool,
    log_tree: Option<LogTree>,
    metrics: Vec<Arc<dyn Metrics>>,
}

impl SupervisorBuilder {
    /// Creates a builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the runtime configuration.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Disables trapping of runnable panics.
    ///
    /// With this set, a panicking runnable takes its task down without a
    /// death report, so its subtree is never restarted. Useful only for
    /// tests and local debugging where faults should stay loud.
    #[must_use]
    pub fn propagate_panic(mut self) -> Self {
        self.propagate_panic = true;
        self
    }

    /// Attaches an existing log tree instead of creating one.
    #[must_use]
    pub fn with_log_tree(mut self, log_tree: LogTree) -> Self {
        self.log_tree = Some(log_tree);
        self
    }

    /// Replaces the set of metrics observers.
    #[must_use]
    pub fn with_metrics(mut self, observers: Vec<Arc<dyn Metrics>>) -> Self {
        self.metrics = observers;
        self
    }

    /// Adds one metrics observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Metrics>) -> Self {
        self.metrics.push(observer);
        self
    }

    /// Builds the supervisor and starts the given root runnable under it.
    ///
    /// Must be called within a tokio runtime: this spawns the processor
    /// task and, transitively, every runnable task.
    pub fn spawn(self, root: RunnableRef) -> Supervisor {
        let top = CancellationToken::new();
        let (req_tx, req_rx) = mpsc::channel(1);

        let logs = self
            .log_tree
            .unwrap_or_else(|| LogTree::with_capacity(self.config.log_capacity));

        let shared = Arc::new(Shared {
            tree: Mutex::new(Tree::new(root, top.clone())),
            req_tx,
            logs,
            metrics: MetricsSet::new(self.metrics),
            config: self.config,
            propagate_panic: self.propagate_panic,
        });
        shared.metrics.notify_node_state(ROOT_DN, NodeState::New);

        let processor = Processor::new(shared.clone(), req_rx, top.clone());
        let handle = tokio::spawn(processor.run());

        // The queue is freshly created with capacity 1, so the initial
        // schedule always fits.
        let _ = shared.req_tx.try_send(Request::Schedule {
            dn: Arc::from(ROOT_DN),
        });

        Supervisor {
            shared,
            top,
            processor: Mutex::new(Some(handle)),
        }
    }
}

/// Handle to a running supervision tree.
///
/// Dropping the handle does not stop the tree; call [`Supervisor::shutdown`]
/// (and optionally [`Supervisor::wait`]) for an orderly teardown.
///
/// ## Example
/// ```no_run
/// use treevisor::{RunnableError, RunnableFn, Scope, Signal, Supervisor};
///
/// #[tokio::main]
/// async fn main() {
///     let sup = Supervisor::spawn(RunnableFn::arc(|scope: Scope| async move {
///         scope.run("child", RunnableFn::arc(|scope: Scope| async move {
///             scope.signal(Signal::Healthy);
///             scope.cancelled().await;
///             Err(RunnableError::Canceled)
///         }))?;
///         scope.signal(Signal::Healthy);
///         scope.signal(Signal::Done);
///         Ok(())
///     }));
///
///     // ... run until some external stop condition ...
///     sup.shutdown();
///     sup.wait().await;
/// }
/// ```
pub struct Supervisor {
    shared: Arc<Shared>,
    top: CancellationToken,
    processor: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Starts `root` under a new supervisor with default options.
    ///
    /// Must be called within a tokio runtime. See [`Supervisor::builder`]
    /// for configuration, metrics observers, and log tree attachment.
    pub fn spawn(root: RunnableRef) -> Self {
        Self::builder().spawn(root)
    }

    /// Returns a builder for a customized supervisor.
    #[must_use]
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Cancels the top-level scope: every runnable's scope gets canceled,
    /// nothing is restarted anymore, and the liquidator drains the
    /// remaining death reports.
    pub fn shutdown(&self) {
        self.top.cancel();
    }

    /// Resolves once the tree has been quiet (no schedules, no deaths) for
    /// a number of consecutive planner ticks, or once the supervisor shuts
    /// down. Intended for tests.
    pub async fn settled(&self) {
        let (waiter, done) = oneshot::channel();
        if self
            .shared
            .req_tx
            .send(Request::WaitSettled { waiter })
            .await
            .is_err()
        {
            return;
        }
        let _ = done.await;
    }

    /// Waits for the processor (and, after shutdown, the liquidator) to
    /// finish. Returns immediately on subsequent calls. Without a prior
    /// [`Supervisor::shutdown`] this only returns once the tree dies on
    /// its own, which a healthy tree never does.
    pub async fn wait(&self) {
        let handle = self.processor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// The log tree every node logs into.
    #[must_use]
    pub fn log_tree(&self) -> &LogTree {
        &self.shared.logs
    }
}
