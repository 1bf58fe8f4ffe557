//! # Runnable trait.
//!
//! A [`Runnable`] is an async, cancelable unit of work run under
//! supervision. It receives a [`Scope`] that is live for as long as the
//! runnable should keep running; when the scope is canceled the runnable is
//! expected to stop promptly and return [`RunnableError::Canceled`].
//!
//! ## Contract
//! - Spawn children (via [`Scope::run`]/[`Scope::run_group`]) only during
//!   setup, before signaling healthy.
//! - Call `scope.signal(Signal::Healthy)` once setup is done and the
//!   runnable is ready to serve.
//! - Watch `scope.cancelled()` and exit promptly when it fires; the runtime
//!   never forcibly kills a task that ignores cancellation.
//!
//! # Example
//! ```
//! use async_trait::async_trait;
//! use treevisor::{Runnable, RunnableError, Scope, Signal};
//!
//! struct Ticker;
//!
//! #[async_trait]
//! impl Runnable for Ticker {
//!     async fn run(&self, scope: Scope) -> Result<(), RunnableError> {
//!         scope.signal(Signal::Healthy);
//!         scope.cancelled().await;
//!         Err(RunnableError::Canceled)
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RunnableError;
use crate::scope::Scope;

/// # Asynchronous, cancelable unit of supervised work.
///
/// Implementations should regularly check their scope's cancellation and
/// exit quickly during shutdown or group teardown. The same instance is
/// re-run after every restart, so per-run state belongs inside `run`, not
/// on `self`.
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    /// Executes the runnable until completion or cancellation.
    async fn run(&self, scope: Scope) -> Result<(), RunnableError>;
}

/// Shared handle to a runnable.
pub type RunnableRef = Arc<dyn Runnable>;
