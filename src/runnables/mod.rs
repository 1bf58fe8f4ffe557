//! Runnable abstraction: the unit of supervised work.
//!
//! A runnable is an async unit that receives a [`Scope`](crate::Scope) and
//! resolves to `Result<(), RunnableError>`. The common handle type is
//! [`RunnableRef`], an `Arc<dyn Runnable>` suitable for sharing across the
//! runtime (the same handle is re-run on every restart).

mod runnable;
mod runnable_fn;

pub use runnable::{Runnable, RunnableRef};
pub use runnable_fn::RunnableFn;
