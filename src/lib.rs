//! # treevisor
//!
//! **Treevisor** is a supervision-tree runtime for async Rust: a mechanism
//! for starting, monitoring and restarting hierarchically organized
//! concurrent tasks ("runnables"), built on the Erlang/OTP supervision tree
//! idea and adapted to tokio's cooperative-cancellation model.
//!
//! Every long-running piece of logic runs as a supervised task. The runtime
//! guarantees that failures are contained to their supervision group, that
//! group members are restarted together when one of them dies, and that
//! shutdown is orderly and bounded.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         Supervisor::spawn(root)
//!                                  │
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Processor (single tree-mutation task)                            │
//! │  - request queue (capacity 1: backpressure)                       │
//! │  - Schedule → spawn runnable task, trap panics                    │
//! │  - Died     → node state machine + group cancellation             │
//! │  - tick     → restart planner on dirty trees                      │
//! └─────┬────────────────────┬───────────────────┬────────────────────┘
//!       ▼                    ▼                   ▼
//!  ┌─────────┐          ┌─────────┐         ┌─────────┐
//!  │ root    │──run()──►│ child   │──run()─►│ child   │   (every runnable
//!  │ task    │          │ task    │         │ task    │    gets a Scope)
//!  └────┬────┘          └────┬────┘         └────┬────┘
//!       │ Signal(Healthy/Done)    RunGroup siblings form a group:
//!       │ Died reports            one unexpected death cancels the rest
//!       ▼
//!   LogTree (per-DN loggers)    Metrics observers (state transitions)
//! ```
//!
//! ### Node lifecycle
//! ```text
//!            Signal(Healthy)
//!   New ───────────────────────► Healthy
//!    │                             │ Signal(Done) + clean return  → Done
//!    │ runnable returns:           │ own-cancellation error       → Canceled
//!    │                             │ anything else (incl. panics) → Dead
//!    ▼                             ▼
//!   (same classification)     Dead cancels its own scope and every
//!                             group sibling's scope
//!
//!   Dead / Canceled / Done ──restart planner──► New (fresh scope;
//!     backoff applies only to Dead — canceled nodes were not at fault)
//! ```
//!
//! The restart planner only resets a node once its whole subtree is
//! terminal, and always picks the largest restartable subtrees, so a dead
//! branch comes back as one unit. Canceling the supervisor's top-level
//! scope stops all restarting and hands the tree to a liquidator that
//! drains the remaining death reports.
//!
//! ## Example
//! ```no_run
//! use treevisor::{RunnableError, RunnableFn, Scope, Signal, Supervisor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let sup = Supervisor::spawn(RunnableFn::arc(|scope: Scope| async move {
//!         // Spawn children during setup, before signaling healthy.
//!         scope.run("ticker", RunnableFn::arc(|scope: Scope| async move {
//!             scope.signal(Signal::Healthy);
//!             loop {
//!                 tokio::select! {
//!                     _ = scope.cancelled() => return Err(RunnableError::Canceled),
//!                     _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {
//!                         scope.logger().info("tick");
//!                     }
//!                 }
//!             }
//!         }))?;
//!
//!         scope.signal(Signal::Healthy);
//!         scope.signal(Signal::Done);
//!         Ok(())
//!     }));
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     sup.shutdown();
//!     sup.wait().await;
//! }
//! ```

mod config;
mod core;
mod error;
mod logtree;
mod metrics;
mod policies;
mod runnables;
mod scope;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{NodeState, Supervisor, SupervisorBuilder};
pub use error::{RunnableError, SpawnError};
pub use logtree::{LogEntry, LogTree, Logger, Severity};
pub use metrics::{InMemoryMetrics, Metrics, StateCounters};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use runnables::{Runnable, RunnableFn, RunnableRef};
pub use scope::{Scope, Signal};
