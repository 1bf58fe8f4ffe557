//! Error types used by the treevisor runtime and runnables.
//!
//! This module defines two main error enums:
//!
//! - [`RunnableError`] — what a runnable's future resolves to when it does
//!   not finish cleanly.
//! - [`SpawnError`] — errors raised by [`Scope::run_group`](crate::Scope::run_group)
//!   and [`Scope::sub_logger`](crate::Scope::sub_logger) (naming and
//!   lifecycle violations).
//!
//! Both types provide `as_label` helpers for logs/metrics.

use thiserror::Error;

/// # Errors returned by runnable executions.
///
/// A supervised runnable resolves to `Result<(), RunnableError>`. How the
/// runtime reacts depends on the variant and on whether the runnable's scope
/// was canceled at the time — see the node state machine on
/// [`NodeState`](crate::NodeState).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RunnableError {
    /// The runnable failed. Always treated as an unexpected death.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The runnable observed its scope's cancellation and stopped.
    ///
    /// Only counts as a clean (Canceled) exit if the runnable's own scope
    /// really was canceled; returning this from a live scope is an
    /// unexpected death like any other.
    #[error("scope canceled")]
    Canceled,

    /// The runnable panicked and the panic was trapped by the runtime.
    #[error("panic: {message}")]
    Panic {
        /// Stringified panic payload.
        message: String,
    },
}

impl RunnableError {
    /// Wraps an arbitrary error message into [`RunnableError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        RunnableError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RunnableError::Fail { .. } => "runnable_failed",
            RunnableError::Canceled => "runnable_canceled",
            RunnableError::Panic { .. } => "runnable_panicked",
        }
    }

    /// True if this is the cancellation sentinel.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RunnableError::Canceled)
    }
}

/// Lets runnables propagate spawn failures with `?`; a failed `run_group`
/// during setup is an unexpected death like any other.
impl From<SpawnError> for RunnableError {
    fn from(err: SpawnError) -> Self {
        RunnableError::Fail {
            error: err.to_string(),
        }
    }
}

/// # Errors returned when spawning child runnables or sub-loggers.
///
/// These surface programming mistakes (bad names, collisions, calling
/// [`Scope::run_group`](crate::Scope::run_group) after signaling healthy) to
/// the offending runnable as ordinary `Result` errors. No node is created
/// when any entry of a `run_group` call fails validation.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpawnError {
    /// The name is empty, too long, or contains characters outside `[a-z0-9_]`.
    #[error("runnable name {name:?} is invalid")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A sibling runnable with this name already exists.
    #[error("runnable {name:?} already exists")]
    AlreadyExists {
        /// The colliding name.
        name: String,
    },

    /// The name was reserved, e.g. by a sub-logger.
    #[error("runnable {name:?} would shadow a reserved name (eg. sub-logger)")]
    Reserved {
        /// The reserved name.
        name: String,
    },

    /// The same name appears twice within one `run_group` call.
    #[error("duplicate runnable name {name:?} in one group")]
    Duplicate {
        /// The duplicated name.
        name: String,
    },

    /// Children may only be started while the parent is still setting up
    /// (before it signals healthy).
    #[error("cannot run new runnables on a node that is no longer setting up")]
    NotNew,

    /// The scope refers to a node that is no longer part of the tree.
    #[error("node {dn:?} is no longer part of the tree")]
    UnknownNode {
        /// Distinguished name the scope was bound to.
        dn: String,
    },
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::InvalidName { .. } => "spawn_invalid_name",
            SpawnError::AlreadyExists { .. } => "spawn_already_exists",
            SpawnError::Reserved { .. } => "spawn_reserved_name",
            SpawnError::Duplicate { .. } => "spawn_duplicate_name",
            SpawnError::NotNew => "spawn_not_new",
            SpawnError::UnknownNode { .. } => "spawn_unknown_node",
        }
    }
}
