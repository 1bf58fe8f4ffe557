//! # Restart planner ("GC").
//!
//! The planner is the main business logic of the supervision tree. Once per
//! dirty tick it traverses the locked tree and finds subtrees that must be
//! restarted (because of a dead or canceled runnable), then the subset of
//! those that *can* be restarted — the ones that are fully, recursively
//! terminal. It selects the smallest set of largest such subtrees, so a
//! whole dead subtree restarts as one unit rather than node by node.
//!
//! Three phases, all pure functions over the tree (the processor applies
//! the results — backoff, reset, reschedule):
//!
//! 1. **Leaves**: collect every node without children.
//! 2. **Readiness**: bottom-up worklist from the leaves. A node is ready
//!    iff its own state is terminal and every child is ready. A node whose
//!    children lack a verdict is requeued — this handles arrival through a
//!    shorter path from a lower-order leaf.
//! 3. **Selection**: top-down from the root. A node *wants* a restart if it
//!    is dead or canceled; it *can* restart now if it is ready and its
//!    parent's scope hasn't itself been canceled (in which case the parent
//!    is about to be torn down or restarted, making this restart
//!    redundant). Traversal stops descending at a selected node.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::tree::{parent_dn, NodeState, Tree, ROOT_DN};

/// Phase-two output.
pub(crate) struct Readiness {
    /// Verdict per DN: true if the node's whole subtree is terminal.
    pub(crate) ready: HashMap<Arc<str>, bool>,
    /// Dead nodes that have to wait for children, with the children that
    /// held them back. Logged as warnings by the caller.
    pub(crate) waiting_dead: Vec<(Arc<str>, Vec<Arc<str>>)>,
}

/// Phase two: bottom-up readiness analysis starting from `leaves`.
pub(crate) fn compute_ready(tree: &Tree, leaves: Vec<Arc<str>>) -> Readiness {
    let mut visited: HashSet<Arc<str>> = HashSet::new();
    let mut ready: HashMap<Arc<str>, bool> = HashMap::new();
    let mut waiting_dead: Vec<(Arc<str>, Vec<Arc<str>>)> = Vec::new();

    let mut queue: VecDeque<Arc<str>> = leaves.into();
    while let Some(cur) = queue.pop_front() {
        if visited.contains(&cur) {
            continue;
        }
        let Some(node) = tree.get(&cur) else {
            continue;
        };

        let children = tree.children_dns(&cur);
        if !children.iter().all(|c| visited.contains(c)) {
            // No verdict about some child yet; retry once the longer path
            // to it has been walked.
            queue.push_back(cur);
            continue;
        }

        let children_not_ready: Vec<Arc<str>> = children
            .into_iter()
            .filter(|c| !ready.get(c).copied().unwrap_or(false))
            .collect();
        let children_ready = children_not_ready.is_empty();
        let cur_ready = node.state.is_terminal();

        if node.state == NodeState::Dead && !children_ready {
            waiting_dead.push((cur.clone(), children_not_ready));
        }

        visited.insert(cur.clone());
        ready.insert(cur.clone(), children_ready && cur_ready);

        if let Some(parent) = parent_dn(&cur) {
            if !visited.contains(parent) {
                if let Some(parent_node) = tree.get(parent) {
                    queue.push_back(parent_node.dn.clone());
                }
            }
        }
    }

    Readiness {
        ready,
        waiting_dead,
    }
}

/// Phase three: top-down selection of the maximal restartable subtrees.
pub(crate) fn select_restarts(tree: &Tree, ready: &HashMap<Arc<str>, bool>) -> Vec<Arc<str>> {
    let mut selected: Vec<Arc<str>> = Vec::new();
    let mut queue: VecDeque<Arc<str>> = VecDeque::new();
    if let Some(root) = tree.get(ROOT_DN) {
        queue.push_back(root.dn.clone());
    }

    while let Some(cur) = queue.pop_front() {
        let Some(node) = tree.get(&cur) else {
            continue;
        };

        // Dead and canceled nodes want a restart. So does a Done node whose
        // own scope got canceled (its group failed after it finished) —
        // nothing is running in it, so no death report will ever arrive to
        // flip it to Canceled.
        let wants = match node.state {
            NodeState::Dead | NodeState::Canceled => true,
            NodeState::Done => node.cancel.is_cancelled(),
            NodeState::New | NodeState::Healthy => false,
        };
        if wants && ready.get(&cur).copied().unwrap_or(false) {
            // Restart only under a live parent scope; a canceled parent is
            // itself about to be handled.
            let parent_live = match parent_dn(&cur) {
                None => true,
                Some(p) => tree.get(p).is_some_and(|n| !n.cancel.is_cancelled()),
            };
            if parent_live {
                selected.push(cur);
                continue;
            }
        }

        // Look further down for something that can be done.
        for child in tree.children_dns(&cur) {
            queue.push_back(child);
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runnables::{RunnableFn, RunnableRef};
    use tokio_util::sync::CancellationToken;

    fn noop() -> RunnableRef {
        RunnableFn::arc(|_scope: crate::scope::Scope| async {
            Ok::<(), crate::error::RunnableError>(())
        })
    }

    fn set_state(tree: &mut Tree, dn: &str, state: NodeState) {
        tree.get_mut(dn).unwrap().state = state;
    }

    /// root{a{deep}, b} with everything New.
    fn sample_tree() -> Tree {
        let mut t = Tree::new(noop(), CancellationToken::new());
        t.run_group(ROOT_DN, vec![("a".into(), noop()), ("b".into(), noop())])
            .unwrap();
        t.run_group("root.a", vec![("deep".into(), noop())])
            .unwrap();
        t
    }

    fn plan(tree: &Tree) -> (Readiness, Vec<Arc<str>>) {
        let readiness = compute_ready(tree, tree.leaves());
        let selected = select_restarts(tree, &readiness.ready);
        (readiness, selected)
    }

    #[test]
    fn test_running_tree_selects_nothing() {
        let t = sample_tree();
        let (readiness, selected) = plan(&t);
        assert!(readiness.ready.values().all(|r| !r));
        assert!(selected.is_empty());
    }

    #[test]
    fn test_dead_leaf_is_selected() {
        let mut t = sample_tree();
        set_state(&mut t, "root.b", NodeState::Dead);
        let (readiness, selected) = plan(&t);
        assert_eq!(readiness.ready.get("root.b").copied(), Some(true));
        let selected: Vec<&str> = selected.iter().map(|d| &**d).collect();
        assert_eq!(selected, vec!["root.b"]);
    }

    #[test]
    fn test_dead_parent_waits_for_live_child() {
        let mut t = sample_tree();
        set_state(&mut t, "root.a", NodeState::Dead);
        // root.a.deep still New: root.a is not ready.
        let (readiness, selected) = plan(&t);
        assert_eq!(readiness.ready.get("root.a").copied(), Some(false));
        assert_eq!(readiness.waiting_dead.len(), 1);
        assert_eq!(&*readiness.waiting_dead[0].0, "root.a");
        assert!(selected.is_empty());
    }

    #[test]
    fn test_whole_subtree_restarts_as_one_unit() {
        let mut t = sample_tree();
        set_state(&mut t, "root.a", NodeState::Dead);
        set_state(&mut t, "root.a.deep", NodeState::Canceled);
        let (_, selected) = plan(&t);
        // Maximal subtree only; the canceled child is subsumed.
        let selected: Vec<&str> = selected.iter().map(|d| &**d).collect();
        assert_eq!(selected, vec!["root.a"]);
    }

    #[test]
    fn test_canceled_parent_scope_defers_restart() {
        let mut t = sample_tree();
        set_state(&mut t, "root.a.deep", NodeState::Dead);
        // root.a's own scope was canceled (it is about to be torn down).
        t.get("root.a").unwrap().cancel.cancel();
        let (readiness, selected) = plan(&t);
        assert_eq!(readiness.ready.get("root.a.deep").copied(), Some(true));
        assert!(selected.is_empty());
    }

    #[test]
    fn test_done_is_ready_but_not_wanted() {
        let mut t = sample_tree();
        set_state(&mut t, "root.b", NodeState::Done);
        let (readiness, selected) = plan(&t);
        assert_eq!(readiness.ready.get("root.b").copied(), Some(true));
        assert!(selected.is_empty());
    }

    #[test]
    fn test_canceled_done_node_is_wanted() {
        // A finished node caught in its group's blast radius has nothing
        // running that could report back; the planner must pick it up.
        let mut t = sample_tree();
        set_state(&mut t, "root.a", NodeState::Done);
        set_state(&mut t, "root.a.deep", NodeState::Canceled);
        t.get("root.a").unwrap().cancel.cancel();
        let (_, selected) = plan(&t);
        let selected: Vec<&str> = selected.iter().map(|d| &**d).collect();
        assert_eq!(selected, vec!["root.a"]);
    }

    #[test]
    fn test_sibling_subtrees_restart_independently() {
        let mut t = sample_tree();
        set_state(&mut t, "root.b", NodeState::Dead);
        set_state(&mut t, "root.a", NodeState::Canceled);
        set_state(&mut t, "root.a.deep", NodeState::Canceled);
        let (_, selected) = plan(&t);
        let mut selected: Vec<&str> = selected.iter().map(|d| &**d).collect();
        selected.sort_unstable();
        assert_eq!(selected, vec!["root.a", "root.b"]);
    }
}
