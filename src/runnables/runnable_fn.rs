//! # Function-backed runnable (`RunnableFn`)
//!
//! [`RunnableFn`] wraps a closure `F: Fn(Scope) -> Fut`, producing a fresh
//! future per run. Each restart calls the closure again, so runs never share
//! hidden mutable state; if shared state is wanted, capture an `Arc<...>`
//! explicitly inside the closure.
//!
//! ## Example
//! ```rust
//! use treevisor::{RunnableError, RunnableFn, RunnableRef, Scope, Signal};
//!
//! let worker: RunnableRef = RunnableFn::arc(|scope: Scope| async move {
//!     scope.signal(Signal::Healthy);
//!     scope.cancelled().await;
//!     Err(RunnableError::Canceled)
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RunnableError;
use crate::runnables::runnable::Runnable;
use crate::scope::Scope;

/// Function-backed runnable implementation.
///
/// Wraps a closure that *creates* a new future per run.
pub struct RunnableFn<F> {
    f: F,
}

impl<F> RunnableFn<F> {
    /// Creates a new function-backed runnable.
    ///
    /// Prefer [`RunnableFn::arc`] when you immediately need a
    /// [`RunnableRef`](crate::RunnableRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the runnable and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Runnable for RunnableFn<F>
where
    F: Fn(Scope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RunnableError>> + Send + 'static,
{
    async fn run(&self, scope: Scope) -> Result<(), RunnableError> {
        (self.f)(scope).await
    }
}
