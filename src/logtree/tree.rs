//! # In-memory DN-keyed log store.
//!
//! [`LogTree`] keeps a bounded ring of [`LogEntry`] values tagged with the
//! distinguished name of the node that emitted them. Handles returned by
//! [`LogTree::leveled_for`] are cheap to clone and append through a shared
//! lock.
//!
//! ## Rules
//! - Bounded capacity: oldest entries are evicted first.
//! - `read(dn)` returns entries for that exact DN, in append order.
//! - `read_subtree(dn)` additionally includes every descendant DN.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use super::logger::Logger;

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Verbose diagnostics.
    Debug,
    /// Normal operational messages.
    Info,
    /// Something unexpected that the runtime recovered from.
    Warning,
    /// A failure; for the supervisor itself, every unexpected death.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One routed log line.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Distinguished name of the emitting node (or sub-logger).
    pub dn: Arc<str>,
    /// Entry severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
    /// Wall-clock timestamp.
    pub at: SystemTime,
}

#[derive(Debug)]
struct Store {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

/// Bounded, DN-keyed in-memory log tree.
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone, Debug)]
pub struct LogTree {
    inner: Arc<Mutex<Store>>,
}

impl LogTree {
    /// Creates a log tree with the default capacity (4096 entries).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    /// Creates a log tree holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Store {
                entries: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Returns a leveled logger emitting under the given DN.
    #[must_use]
    pub fn leveled_for(&self, dn: impl Into<Arc<str>>) -> Logger {
        Logger::new(dn.into(), self.clone())
    }

    /// Returns the stored backlog for exactly `dn`, oldest first.
    #[must_use]
    pub fn read(&self, dn: &str) -> Vec<LogEntry> {
        let store = self.inner.lock();
        store
            .entries
            .iter()
            .filter(|e| &*e.dn == dn)
            .cloned()
            .collect()
    }

    /// Returns the stored backlog for `dn` and every DN below it.
    #[must_use]
    pub fn read_subtree(&self, dn: &str) -> Vec<LogEntry> {
        let store = self.inner.lock();
        store
            .entries
            .iter()
            .filter(|e| &*e.dn == dn || e.dn.starts_with(dn) && e.dn.as_bytes()[dn.len()] == b'.')
            .cloned()
            .collect()
    }

    pub(crate) fn append(&self, dn: Arc<str>, severity: Severity, message: String) {
        let mut store = self.inner.lock();
        if store.entries.len() == store.capacity {
            store.entries.pop_front();
        }
        store.entries.push_back(LogEntry {
            dn,
            severity,
            message,
            at: SystemTime::now(),
        });
    }
}

impl Default for LogTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_exact_dn() {
        let lt = LogTree::new();
        lt.leveled_for("root.foo").info("hello");
        lt.leveled_for("root.foobar").info("other");

        let entries = lt.read("root.foo");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "hello");
        assert_eq!(entries[0].severity, Severity::Info);
    }

    #[test]
    fn test_read_subtree_excludes_prefix_cousins() {
        let lt = LogTree::new();
        lt.leveled_for("root.foo").info("a");
        lt.leveled_for("root.foo.bar").warn("b");
        lt.leveled_for("root.foobar").info("c");

        let entries = lt.read_subtree("root.foo");
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let lt = LogTree::with_capacity(2);
        let log = lt.leveled_for("root");
        log.info("one");
        log.info("two");
        log.info("three");

        let entries = lt.read("root");
        let messages: Vec<&str> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }
}
