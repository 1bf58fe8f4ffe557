//! # Leveled logger handle.
//!
//! A [`Logger`] emits entries under one fixed DN into its [`LogTree`].
//! Handles are cheap to clone and safe to use from any task.

use std::fmt::Display;
use std::sync::Arc;

use super::tree::{LogTree, Severity};

/// Leveled logger bound to one distinguished name.
#[derive(Clone, Debug)]
pub struct Logger {
    dn: Arc<str>,
    tree: LogTree,
}

impl Logger {
    pub(crate) fn new(dn: Arc<str>, tree: LogTree) -> Self {
        Self { dn, tree }
    }

    /// The DN this logger emits under.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Logs a debug-level message.
    pub fn debug(&self, message: impl Display) {
        self.log(Severity::Debug, message);
    }

    /// Logs an info-level message.
    pub fn info(&self, message: impl Display) {
        self.log(Severity::Info, message);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, message: impl Display) {
        self.log(Severity::Warning, message);
    }

    /// Logs an error-level message.
    pub fn error(&self, message: impl Display) {
        self.log(Severity::Error, message);
    }

    fn log(&self, severity: Severity, message: impl Display) {
        self.tree
            .append(self.dn.clone(), severity, message.to_string());
    }
}
