//! # Processor: the single tree-mutation loop.
//!
//! The processor owns the request queue through which every tree mutation
//! is funneled. All tree-shape decisions are made by exactly this one task;
//! runnables only send requests. The queue has capacity 1, so a task
//! reporting a death blocks until the processor is ready — backpressure
//! instead of unbounded queues of stale events.
//!
//! ## Request flow
//! ```text
//! Scope::run_group ──► Schedule{dn} ──► spawn runnable task (panic-trapped)
//!                                              │
//!                                              ▼ on return/panic
//!                              Died{dn, result} ──► state machine:
//!                                  Ok + signaled_done        → Done
//!                                  Err(Canceled) + canceled  → Canceled
//!                                  anything else             → Dead
//!                                                              + cancel own
//!                                                                and group
//!                                                                siblings
//!
//! tick (1ms) ──► planner pass, but only if the tree changed since the
//!                previous pass; `settle_cycles` change-free ticks release
//!                WaitSettled waiters
//! ```
//!
//! ## Shutdown
//! When the top-level scope is canceled the processor performs a one-shot
//! kill — canceling every node's scope, parents first — and then becomes
//! the liquidator: a loop with no restart logic that marks nodes dead as
//! their reports trickle in, and exits once every node is terminal. Nothing
//! can be stuck waiting for a processor that no longer reschedules.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::planner;
use crate::core::supervisor::Shared;
use crate::core::tree::NodeState;
use crate::error::RunnableError;
use crate::logtree::Logger;
use crate::scope::Scope;

/// A request for the processor.
pub(crate) enum Request {
    /// Start the node's runnable as a new task.
    Schedule {
        /// DN of the node to start.
        dn: Arc<str>,
    },
    /// A runnable task has finished, one way or another.
    Died {
        /// DN of the node whose runnable finished.
        dn: Arc<str>,
        /// What its future resolved to.
        result: Result<(), RunnableError>,
    },
    /// Notify `waiter` once the tree has been quiet for a number of
    /// consecutive planner ticks.
    WaitSettled {
        /// Dropped-or-signaled once settled; dropping it on shutdown also
        /// unblocks the caller.
        waiter: oneshot::Sender<()>,
    },
}

pub(crate) struct Processor {
    shared: Arc<Shared>,
    rx: mpsc::Receiver<Request>,
    top: CancellationToken,
}

impl Processor {
    pub(crate) fn new(
        shared: Arc<Shared>,
        rx: mpsc::Receiver<Request>,
        top: CancellationToken,
    ) -> Self {
        Self { shared, rx, top }
    }

    /// Runs until the top-level scope is canceled, then kills the tree,
    /// liquidates it, and returns.
    pub(crate) async fn run(mut self) {
        let ilogger = self.shared.ilogger();
        ilogger.info("supervisor processor started");

        let top = self.top.clone();
        let mut tick = time::interval(self.shared.config.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The planner runs on the next tick after any tree change, so a
        // burst of near-simultaneous failures is planned in one pass.
        let mut clean = true;
        let mut clean_cycles: u32 = 0;
        let mut waiters: Vec<oneshot::Sender<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = top.cancelled() => {
                    ilogger.info("supervisor processor exiting: top-level scope canceled");
                    self.kill();
                    ilogger.info("supervisor exited, liquidating remaining runnables");
                    self.liquidate(&ilogger).await;
                    return;
                }
                _ = tick.tick() => {
                    if !clean {
                        self.plan(&ilogger);
                    }
                    clean = true;
                    clean_cycles = clean_cycles.saturating_add(1);
                    if clean_cycles > self.shared.config.settle_cycles {
                        for waiter in waiters.drain(..) {
                            let _ = waiter.send(());
                        }
                    }
                }
                req = self.rx.recv() => {
                    let Some(req) = req else { return };
                    match req {
                        Request::Schedule { dn } => {
                            self.schedule(&dn, &ilogger);
                            clean = false;
                            clean_cycles = 0;
                        }
                        Request::Died { dn, result } => {
                            self.died(&dn, result, &ilogger);
                            clean = false;
                            clean_cycles = 0;
                        }
                        Request::WaitSettled { waiter } => waiters.push(waiter),
                    }
                }
            }
        }
    }

    /// Starts a node's runnable as a new task and arranges for its outcome
    /// to come back as a Died request.
    fn schedule(&self, dn: &Arc<str>, ilogger: &Logger) {
        let (scope, runnable) = {
            let tree = self.shared.tree.lock();
            let Some(node) = tree.get(dn) else {
                ilogger.warn(format!("schedule request for unknown node {dn}, ignoring"));
                return;
            };
            (
                Scope {
                    shared: self.shared.clone(),
                    dn: node.dn.clone(),
                    cancel: node.cancel.clone(),
                },
                node.runnable.clone(),
            )
        };

        let tx = self.shared.req_tx.clone();
        let propagate_panic = self.shared.propagate_panic;
        let dn = dn.clone();
        tokio::spawn(async move {
            let fut = runnable.run(scope);
            let result = if propagate_panic {
                fut.await
            } else {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(RunnableError::Panic {
                        message: panic_message(payload),
                    }),
                }
            };
            let _ = tx.send(Request::Died { dn, result }).await;
        });
    }

    /// Records a runnable's outcome and updates its node per the state
    /// machine. Unexpected deaths cancel the node's own scope and every
    /// group sibling's, so the group unwinds together.
    fn died(&self, dn: &Arc<str>, result: Result<(), RunnableError>, ilogger: &Logger) {
        let mut tree = self.shared.tree.lock();
        let Some(node) = tree.get_mut(dn) else {
            ilogger.warn(format!("death report for unknown node {dn}, ignoring"));
            return;
        };

        // Expected exit: declared done, then returned cleanly.
        if result.is_ok() && node.signaled_done {
            node.state = NodeState::Done;
            self.shared.metrics.notify_node_state(dn, NodeState::Done);
            ilogger.info(format!("{dn}: done"));
            return;
        }

        // Expected exit: asked to cancel, returned the cancellation error.
        if matches!(result, Err(RunnableError::Canceled)) && node.cancel.is_cancelled() {
            node.state = NodeState::Canceled;
            self.shared
                .metrics
                .notify_node_state(dn, NodeState::Canceled);
            ilogger.info(format!("{dn}: canceled"));
            return;
        }

        // Otherwise the runnable should not have died or quit. A clean
        // return without having signaled done is an error too.
        let err = match &result {
            Ok(()) => format!("returned without error while {}", node.state),
            Err(e) => e.to_string(),
        };
        ilogger.error(format!("{dn}: {err}"));
        node.state = NodeState::Dead;
        self.shared.metrics.notify_node_state(dn, NodeState::Dead);

        // Cancel the node's scope, in case something still depends on it.
        node.cancel.cancel();

        // And all group siblings.
        for token in tree.sibling_tokens(dn) {
            token.cancel();
        }
    }

    /// One planner pass: compute readiness, select maximal restartable
    /// subtrees, reset them and reschedule after backoff.
    fn plan(&self, ilogger: &Logger) {
        let mut tree = self.shared.tree.lock();

        let readiness = planner::compute_ready(&tree, tree.leaves());
        for (dn, children) in &readiness.waiting_dead {
            ilogger.warn(format!(
                "not restarting {dn}: children not ready to be restarted: {children:?}"
            ));
        }

        for dn in planner::select_restarts(&tree, &readiness.ready) {
            // Only back off when the node unexpectedly died — not when it
            // got canceled in a sibling's or ancestor's blast radius.
            let delay = {
                let Some(node) = tree.get_mut(&dn) else {
                    continue;
                };
                if node.state == NodeState::Dead {
                    let delay = self.shared.config.backoff.next(node.restarts);
                    node.restarts = node.restarts.saturating_add(1);
                    delay
                } else {
                    Duration::ZERO
                }
            };

            if !tree.reset(&dn) {
                continue;
            }
            self.shared.metrics.notify_node_state(&dn, NodeState::New);
            ilogger.info(format!(
                "rescheduling supervised node {dn} with backoff {delay:?}"
            ));

            let token = match tree.get(&dn) {
                Some(node) => node.cancel.clone(),
                None => continue,
            };
            let tx = self.shared.req_tx.clone();
            tokio::spawn(async move {
                if delay > Duration::ZERO {
                    // A canceled scope makes the remaining delay pointless;
                    // schedule right away so the node can settle into a
                    // terminal state instead of stalling its ancestors.
                    tokio::select! {
                        _ = time::sleep(delay) => {}
                        _ = token.cancelled() => {}
                    }
                }
                let _ = tx.send(Request::Schedule { dn }).await;
            });
        }
    }

    /// Cancels every node's scope, parents before children. Called once,
    /// right before liquidation, so nothing gets restarted afterwards.
    fn kill(&self) {
        let tree = self.shared.tree.lock();
        for token in tree.tokens_top_down() {
            token.cancel();
        }
    }

    /// Post-shutdown drain loop. No restart logic: any request just marks
    /// the referenced node dead. Exits once every node is terminal, which
    /// bounds shutdown — nothing waits on a processor that no longer
    /// reschedules anything.
    async fn liquidate(&mut self, ilogger: &Logger) {
        if self.quiescent() {
            ilogger.info("liquidator: complete, all runnables dead or done");
            return;
        }
        while let Some(req) = self.rx.recv().await {
            match req {
                Request::Schedule { dn } => {
                    ilogger.info(format!("liquidator: refusing to schedule {dn}"));
                    self.mark_dead(&dn);
                }
                Request::Died { dn, .. } => {
                    ilogger.info(format!("liquidator: {dn} exited"));
                    self.mark_dead(&dn);
                }
                Request::WaitSettled { waiter } => {
                    // The tree will never settle again; dropping the waiter
                    // unblocks the caller.
                    drop(waiter);
                }
            }
            if self.quiescent() {
                ilogger.info("liquidator: complete, all runnables dead or done");
                return;
            }
        }
    }

    fn mark_dead(&self, dn: &str) {
        let mut tree = self.shared.tree.lock();
        if let Some(node) = tree.get_mut(dn) {
            if node.state != NodeState::Dead {
                node.state = NodeState::Dead;
                self.shared.metrics.notify_node_state(dn, NodeState::Dead);
            }
        }
    }

    fn quiescent(&self) -> bool {
        self.shared.tree.lock().live().is_empty()
    }
}

/// Renders a trapped panic payload for the synthetic death error.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
