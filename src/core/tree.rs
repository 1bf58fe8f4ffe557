//! # Supervision tree data model.
//!
//! A [`Tree`] is an arena of [`Node`]s keyed by distinguished name (DN), the
//! dot-joined path from the root (`root.foo.bar`). Keying by DN removes the
//! need for parent back-pointers — a node's parent DN is derived by
//! stripping the last path segment — and lets the whole tree live behind
//! one coarse lock instead of per-node locks.
//!
//! All mutation happens under that lock: the processor task drives
//! lifecycle decisions, and API calls made from runnable tasks (spawning
//! children, signaling, reserving sub-logger names) take the same lock for
//! their short read/append sections.
//!
//! ## Rules
//! - Every child belongs to exactly one supervision group; groups never
//!   overlap.
//! - A node's cancellation token is derived from its parent's current token
//!   and replaced with a fresh one on every reset; stale tokens are never
//!   reused.
//! - `signaled_done` can only be set while the node is healthy, at most
//!   once.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::SpawnError;
use crate::runnables::RunnableRef;
use crate::scope::Signal;

/// State of a runnable within a node, and in a way the node itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Just created (or reset); its runnable has been started or is about
    /// to be, but hasn't signaled anything yet.
    New,
    /// The runnable signaled being healthy — it is ready to serve/act.
    Healthy,
    /// The runnable unexpectedly returned or panicked.
    Dead,
    /// The runnable declared it is done with its work and then returned
    /// cleanly; it will not be restarted unless a related failure requires
    /// it.
    Done,
    /// The runnable returned after being asked to cancel.
    Canceled,
}

impl NodeState {
    /// True for states a node can be restarted from (nothing is running).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Dead | NodeState::Done | NodeState::Canceled)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeState::New => "new",
            NodeState::Healthy => "healthy",
            NodeState::Dead => "dead",
            NodeState::Done => "done",
            NodeState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Maximum length of a node name.
const MAX_NAME_LEN: usize = 64;

/// Validates a node (or sub-logger) name: 1–64 chars of `[a-z0-9_]`.
pub(crate) fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Returns the parent DN, or `None` for the root.
pub(crate) fn parent_dn(dn: &str) -> Option<&str> {
    dn.rsplit_once('.').map(|(parent, _)| parent)
}

/// A supervision tree node: the state of one runnable within the tree, its
/// relation to other tree elements, and the data needed to supervise it.
pub(crate) struct Node {
    /// Last segment of the DN; unique among siblings.
    pub(crate) name: String,
    /// Full distinguished name; also the arena key.
    pub(crate) dn: Arc<str>,
    /// The supervised work. Immutable once set; re-run on every restart.
    pub(crate) runnable: RunnableRef,
    /// Current lifecycle state.
    pub(crate) state: NodeState,
    /// Set when the runnable signaled Done; the Done state is only applied
    /// once the runnable actually returns.
    pub(crate) signaled_done: bool,
    /// Names of direct children.
    pub(crate) children: BTreeSet<String>,
    /// Names withheld from child use (claimed by sub-loggers).
    pub(crate) reserved: BTreeSet<String>,
    /// Supervision groups: disjoint sets of child names. A failure of any
    /// member cancels the rest of its group.
    pub(crate) groups: Vec<BTreeSet<String>>,
    /// Backoff attempt counter; reset when the node signals healthy.
    pub(crate) restarts: u32,
    /// Cancellation scope handed to the running task. Fresh per reset.
    pub(crate) cancel: CancellationToken,
}

impl Node {
    fn new(name: String, dn: Arc<str>, runnable: RunnableRef, cancel: CancellationToken) -> Self {
        Self {
            name,
            dn,
            runnable,
            state: NodeState::New,
            signaled_done: false,
            children: BTreeSet::new(),
            reserved: BTreeSet::new(),
            groups: Vec::new(),
            restarts: 0,
            cancel,
        }
    }

    /// `dn (state)`, for log and violation messages.
    pub(crate) fn describe(&self) -> String {
        format!("{} ({})", self.dn, self.state)
    }

    /// The group containing `name`, if any. All children are always in a
    /// group, even if that group is unary.
    pub(crate) fn group_siblings(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.groups.iter().find(|g| g.contains(name))
    }
}

/// The DN of the root node.
pub(crate) const ROOT_DN: &str = "root";

/// Arena of nodes keyed by DN.
pub(crate) struct Tree {
    nodes: HashMap<Arc<str>, Node>,
    /// Token the root node's scope derives from (the supervisor's top-level
    /// token), so external shutdown propagates to every runnable.
    above_root: CancellationToken,
}

impl Tree {
    /// Creates a tree holding only the root node.
    pub(crate) fn new(root_runnable: RunnableRef, above_root: CancellationToken) -> Self {
        let dn: Arc<str> = Arc::from(ROOT_DN);
        let root = Node::new(
            ROOT_DN.to_string(),
            dn.clone(),
            root_runnable,
            above_root.child_token(),
        );
        let mut nodes = HashMap::new();
        nodes.insert(dn, root);
        Self { nodes, above_root }
    }

    pub(crate) fn get(&self, dn: &str) -> Option<&Node> {
        self.nodes.get(dn)
    }

    pub(crate) fn get_mut(&mut self, dn: &str) -> Option<&mut Node> {
        self.nodes.get_mut(dn)
    }

    /// Creates one new child node per entry under `parent_dn`, all in one
    /// new supervision group.
    ///
    /// Validation is all-or-nothing: any invalid, colliding, reserved or
    /// duplicated name fails the whole call and creates no node. Returns
    /// the DNs of the created children.
    pub(crate) fn run_group(
        &mut self,
        parent_dn: &str,
        entries: Vec<(String, RunnableRef)>,
    ) -> Result<Vec<Arc<str>>, SpawnError> {
        let parent = self.nodes.get(parent_dn).ok_or(SpawnError::UnknownNode {
            dn: parent_dn.to_string(),
        })?;

        // Children may only be started during setup.
        if parent.state != NodeState::New {
            return Err(SpawnError::NotNew);
        }

        {
            let mut seen: BTreeSet<&str> = BTreeSet::new();
            for (name, _) in &entries {
                if !valid_name(name) {
                    return Err(SpawnError::InvalidName { name: name.clone() });
                }
                if parent.children.contains(name) {
                    return Err(SpawnError::AlreadyExists { name: name.clone() });
                }
                if parent.reserved.contains(name) {
                    return Err(SpawnError::Reserved { name: name.clone() });
                }
                if !seen.insert(name) {
                    return Err(SpawnError::Duplicate { name: name.clone() });
                }
            }
        }

        let parent_token = parent.cancel.clone();

        let mut created: Vec<Node> = Vec::with_capacity(entries.len());
        let mut group: BTreeSet<String> = BTreeSet::new();
        let mut dns: Vec<Arc<str>> = Vec::with_capacity(entries.len());
        for (name, runnable) in entries {
            let dn: Arc<str> = Arc::from(format!("{parent_dn}.{name}"));
            created.push(Node::new(
                name.clone(),
                dn.clone(),
                runnable,
                parent_token.child_token(),
            ));
            group.insert(name);
            dns.push(dn);
        }

        let Some(parent) = self.nodes.get_mut(parent_dn) else {
            return Err(SpawnError::UnknownNode {
                dn: parent_dn.to_string(),
            });
        };
        parent.children.extend(group.iter().cloned());
        parent.groups.push(group);

        for node in created {
            self.nodes.insert(node.dn.clone(), node);
        }
        Ok(dns)
    }

    /// Reserves `name` under `dn` so it can never be used as a child
    /// runnable name (used by sub-loggers). Each name can be reserved only
    /// once.
    pub(crate) fn reserve(&mut self, dn: &str, name: &str) -> Result<(), SpawnError> {
        let node = self
            .nodes
            .get_mut(dn)
            .ok_or(SpawnError::UnknownNode { dn: dn.to_string() })?;
        if node.children.contains(name) {
            return Err(SpawnError::AlreadyExists {
                name: name.to_string(),
            });
        }
        if node.reserved.contains(name) {
            return Err(SpawnError::Reserved {
                name: name.to_string(),
            });
        }
        if !valid_name(name) {
            return Err(SpawnError::InvalidName {
                name: name.to_string(),
            });
        }
        node.reserved.insert(name.to_string());
        Ok(())
    }

    /// Applies a lifecycle signal from the node's runnable.
    ///
    /// Returns `Ok(Some(state))` when a state transition happened (for
    /// observer notification), `Ok(None)` when only intent was recorded,
    /// and `Err(message)` on a sequencing violation — the caller surfaces
    /// that as a panic in the offending runnable.
    pub(crate) fn signal(&mut self, dn: &str, signal: Signal) -> Result<Option<NodeState>, String> {
        let Some(node) = self.nodes.get_mut(dn) else {
            return Err(format!("signal from unknown node {dn:?}"));
        };
        match signal {
            Signal::Healthy => {
                if node.state != NodeState::New {
                    return Err(format!("node {} signaled healthy", node.describe()));
                }
                node.state = NodeState::Healthy;
                node.restarts = 0;
                Ok(Some(NodeState::Healthy))
            }
            Signal::Done => {
                if node.state != NodeState::Healthy {
                    return Err(format!("node {} signaled done", node.describe()));
                }
                if node.signaled_done {
                    return Err(format!("node {} signaled done twice", node.describe()));
                }
                node.signaled_done = true;
                Ok(None)
            }
        }
    }

    /// Prepares a node for rescheduling: removes all descendant nodes from
    /// the arena, clears children/groups/reserved names, derives a fresh
    /// cancellation token from the parent's current one, and sets the state
    /// back to New. Returns false if the node is gone.
    ///
    /// The backoff counter is deliberately left alone — only a Healthy
    /// signal resets it.
    pub(crate) fn reset(&mut self, dn: &str) -> bool {
        if !self.nodes.contains_key(dn) {
            return false;
        }
        for descendant in self.subtree_dns(dn, false) {
            self.nodes.remove(&*descendant);
        }
        let parent_token = match parent_dn(dn) {
            None => self.above_root.clone(),
            Some(p) => match self.nodes.get(p) {
                Some(parent) => parent.cancel.clone(),
                None => return false,
            },
        };
        let Some(node) = self.nodes.get_mut(dn) else {
            return false;
        };
        node.state = NodeState::New;
        node.signaled_done = false;
        node.children.clear();
        node.reserved.clear();
        node.groups.clear();
        node.cancel = parent_token.child_token();
        true
    }

    /// DNs of `dn`'s subtree in BFS order, optionally including `dn` itself.
    pub(crate) fn subtree_dns(&self, dn: &str, include_self: bool) -> Vec<Arc<str>> {
        let mut out = Vec::new();
        let mut queue: VecDeque<Arc<str>> = VecDeque::new();
        if let Some(node) = self.nodes.get(dn) {
            queue.push_back(node.dn.clone());
        }
        let mut first = true;
        while let Some(cur) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&*cur) {
                for child in &node.children {
                    queue.push_back(Arc::from(format!("{cur}.{child}")));
                }
            }
            if !first || include_self {
                out.push(cur);
            }
            first = false;
        }
        out
    }

    /// DNs of `dn`'s direct children.
    pub(crate) fn children_dns(&self, dn: &str) -> Vec<Arc<str>> {
        match self.nodes.get(dn) {
            Some(node) => node
                .children
                .iter()
                .map(|c| Arc::from(format!("{dn}.{c}")))
                .collect(),
            None => Vec::new(),
        }
    }

    /// DNs of all nodes without children (the planner's phase-one set).
    pub(crate) fn leaves(&self) -> Vec<Arc<str>> {
        self.subtree_dns(ROOT_DN, true)
            .into_iter()
            .filter(|dn| {
                self.nodes
                    .get(&**dn)
                    .is_some_and(|n| n.children.is_empty())
            })
            .collect()
    }

    /// Sorted DNs of all nodes that are not in a terminal state.
    pub(crate) fn live(&self) -> Vec<Arc<str>> {
        let mut live: Vec<Arc<str>> = self
            .subtree_dns(ROOT_DN, true)
            .into_iter()
            .filter(|dn| {
                self.nodes
                    .get(&**dn)
                    .is_some_and(|n| !n.state.is_terminal())
            })
            .collect();
        live.sort();
        live
    }

    /// Every node's cancellation token, parents before children.
    pub(crate) fn tokens_top_down(&self) -> Vec<CancellationToken> {
        self.subtree_dns(ROOT_DN, true)
            .iter()
            .filter_map(|dn| self.nodes.get(&**dn).map(|n| n.cancel.clone()))
            .collect()
    }

    /// Cancellation tokens of `dn`'s group siblings (excluding `dn` itself).
    pub(crate) fn sibling_tokens(&self, dn: &str) -> Vec<CancellationToken> {
        let Some(node) = self.nodes.get(dn) else {
            return Vec::new();
        };
        let Some(parent_dn) = parent_dn(dn) else {
            return Vec::new();
        };
        let Some(parent) = self.nodes.get(parent_dn) else {
            return Vec::new();
        };
        let Some(group) = parent.group_siblings(&node.name) else {
            return Vec::new();
        };
        group
            .iter()
            .filter(|name| name.as_str() != node.name)
            .filter_map(|name| self.nodes.get(&*format!("{parent_dn}.{name}")))
            .map(|sibling| sibling.cancel.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runnables::RunnableFn;

    fn noop() -> RunnableRef {
        RunnableFn::arc(|_scope: crate::scope::Scope| async {
            Ok::<(), crate::error::RunnableError>(())
        })
    }

    fn tree() -> Tree {
        Tree::new(noop(), CancellationToken::new())
    }

    #[test]
    fn test_valid_names() {
        assert!(valid_name("etcd"));
        assert!(valid_name("net_0"));
        assert!(!valid_name(""));
        assert!(!valid_name("Upper"));
        assert!(!valid_name("dash-ed"));
        assert!(!valid_name("dotted.name"));
        assert!(!valid_name(&"x".repeat(65)));
    }

    #[test]
    fn test_parent_dn_derivation() {
        assert_eq!(parent_dn("root"), None);
        assert_eq!(parent_dn("root.foo"), Some("root"));
        assert_eq!(parent_dn("root.foo.bar"), Some("root.foo"));
    }

    #[test]
    fn test_run_group_creates_children_in_one_group() {
        let mut t = tree();
        let dns = t
            .run_group(ROOT_DN, vec![("a".into(), noop()), ("b".into(), noop())])
            .unwrap();
        assert_eq!(dns.len(), 2);

        let root = t.get(ROOT_DN).unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.groups.len(), 1);
        assert!(root.group_siblings("a").unwrap().contains("b"));

        // A later call lands in a different group.
        t.run_group(ROOT_DN, vec![("c".into(), noop())]).unwrap();
        let root = t.get(ROOT_DN).unwrap();
        assert_eq!(root.groups.len(), 2);
        assert!(!root.group_siblings("a").unwrap().contains("c"));
    }

    #[test]
    fn test_run_group_rejections_create_nothing() {
        let mut t = tree();
        t.run_group(ROOT_DN, vec![("a".into(), noop())]).unwrap();
        t.reserve(ROOT_DN, "logs").unwrap();

        let cases: Vec<(Vec<(String, RunnableRef)>, SpawnError)> = vec![
            (
                vec![("UPPER".into(), noop())],
                SpawnError::InvalidName {
                    name: "UPPER".into(),
                },
            ),
            (
                vec![("a".into(), noop())],
                SpawnError::AlreadyExists { name: "a".into() },
            ),
            (
                vec![("logs".into(), noop())],
                SpawnError::Reserved {
                    name: "logs".into(),
                },
            ),
            (
                vec![("b".into(), noop()), ("b".into(), noop())],
                SpawnError::Duplicate { name: "b".into() },
            ),
            (
                vec![("ok".into(), noop()), ("".into(), noop())],
                SpawnError::InvalidName { name: "".into() },
            ),
        ];
        for (entries, want) in cases {
            let err = t.run_group(ROOT_DN, entries).unwrap_err();
            assert_eq!(err, want);
        }
        // Nothing partial was created, not even for the mixed valid/invalid call.
        assert!(t.get("root.b").is_none());
        assert!(t.get("root.ok").is_none());
    }

    #[test]
    fn test_reserve_rejects_collisions_and_reuse() {
        let mut t = tree();
        t.run_group(ROOT_DN, vec![("a".into(), noop())]).unwrap();
        t.reserve(ROOT_DN, "logs").unwrap();

        assert_eq!(
            t.reserve(ROOT_DN, "logs").unwrap_err(),
            SpawnError::Reserved {
                name: "logs".into()
            }
        );
        assert_eq!(
            t.reserve(ROOT_DN, "a").unwrap_err(),
            SpawnError::AlreadyExists { name: "a".into() }
        );
        assert_eq!(
            t.reserve(ROOT_DN, "BAD").unwrap_err(),
            SpawnError::InvalidName { name: "BAD".into() }
        );
    }

    #[test]
    fn test_run_group_requires_new_state() {
        let mut t = tree();
        t.signal(ROOT_DN, Signal::Healthy).unwrap();
        let err = t
            .run_group(ROOT_DN, vec![("late".into(), noop())])
            .unwrap_err();
        assert_eq!(err, SpawnError::NotNew);
    }

    #[test]
    fn test_signal_transitions_and_violations() {
        let mut t = tree();
        assert_eq!(
            t.signal(ROOT_DN, Signal::Healthy).unwrap(),
            Some(NodeState::Healthy)
        );
        assert_eq!(t.get(ROOT_DN).unwrap().state, NodeState::Healthy);

        // Done records intent without a state change.
        assert_eq!(t.signal(ROOT_DN, Signal::Done).unwrap(), None);
        assert_eq!(t.get(ROOT_DN).unwrap().state, NodeState::Healthy);
        assert!(t.get(ROOT_DN).unwrap().signaled_done);

        assert!(t.signal(ROOT_DN, Signal::Healthy).is_err());
        assert!(t.signal(ROOT_DN, Signal::Done).is_err());
    }

    #[test]
    fn test_signal_done_requires_healthy() {
        let mut t = tree();
        assert!(t.signal(ROOT_DN, Signal::Done).is_err());
    }

    #[test]
    fn test_healthy_resets_backoff_counter() {
        let mut t = tree();
        t.get_mut(ROOT_DN).unwrap().restarts = 3;
        t.signal(ROOT_DN, Signal::Healthy).unwrap();
        assert_eq!(t.get(ROOT_DN).unwrap().restarts, 0);
    }

    #[test]
    fn test_reset_clears_subtree_and_refreshes_token() {
        let mut t = tree();
        t.run_group(ROOT_DN, vec![("a".into(), noop())]).unwrap();
        t.run_group("root.a", vec![("deep".into(), noop())])
            .unwrap();
        t.get_mut(ROOT_DN).unwrap().state = NodeState::Dead;
        t.get_mut(ROOT_DN).unwrap().restarts = 2;
        let old_token = t.get(ROOT_DN).unwrap().cancel.clone();
        old_token.cancel();

        assert!(t.reset(ROOT_DN));
        assert!(t.get("root.a").is_none());
        assert!(t.get("root.a.deep").is_none());

        let root = t.get(ROOT_DN).unwrap();
        assert_eq!(root.state, NodeState::New);
        assert!(root.children.is_empty());
        assert!(root.groups.is_empty());
        // Restart does not touch the backoff counter.
        assert_eq!(root.restarts, 2);
        // Fresh token, not the canceled one.
        assert!(!root.cancel.is_cancelled());
    }

    #[test]
    fn test_sibling_tokens_are_group_scoped() {
        let mut t = tree();
        t.run_group(ROOT_DN, vec![("a".into(), noop()), ("b".into(), noop())])
            .unwrap();
        t.run_group(ROOT_DN, vec![("c".into(), noop())]).unwrap();

        let siblings = t.sibling_tokens("root.a");
        assert_eq!(siblings.len(), 1);
        for tok in siblings {
            tok.cancel();
        }
        assert!(t.get("root.b").unwrap().cancel.is_cancelled());
        assert!(!t.get("root.c").unwrap().cancel.is_cancelled());
    }

    #[test]
    fn test_leaves_and_live() {
        let mut t = tree();
        t.run_group(ROOT_DN, vec![("a".into(), noop()), ("b".into(), noop())])
            .unwrap();
        t.run_group("root.a", vec![("deep".into(), noop())])
            .unwrap();

        let mut leaves = t.leaves();
        leaves.sort();
        let leaves: Vec<&str> = leaves.iter().map(|d| &**d).collect();
        assert_eq!(leaves, vec!["root.a.deep", "root.b"]);

        t.get_mut("root.b").unwrap().state = NodeState::Dead;
        let live = t.live();
        let live: Vec<&str> = live.iter().map(|d| &**d).collect();
        assert_eq!(live, vec!["root", "root.a", "root.a.deep"]);
    }
}
