//! Wait-for graph model derived from a [`Snapshot`].
//!
//! [`build`] is a pure transform: one node per thread, one node per
//! distinct lock identity, a `waiting` edge from a thread to the lock it
//! is blocked on, and a `held` edge from each owned lock to its owner.
//! The graph is rebuilt from scratch on every update and handed to the
//! rendering surface as a declarative replacement.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::snapshot::{LockInfo, Snapshot, ThreadInfo, ThreadState};
use crate::types::{LockIdentity, ThreadId};

/// Stable node identifier, `thread-{id}` or `lock-{identityHashCode}`.
///
/// Ids depend only on the thread id or lock identity, so the same
/// entity keeps its id across rebuilds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn thread(id: ThreadId) -> Self {
        Self(format!("thread-{id}"))
    }

    pub fn lock(identity: LockIdentity) -> Self {
        Self(format!("lock-{identity}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    Thread { state: ThreadState, deadlocked: bool },
    Lock { class_name: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl GraphNode {
    pub fn is_deadlocked(&self) -> bool {
        matches!(self.kind, NodeKind::Thread { deadlocked: true, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// thread -> lock: the thread is blocked acquiring the lock.
    Waiting,
    /// lock -> thread: the lock is held by the thread.
    Held,
}

impl EdgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting for",
            Self::Held => "held by",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// Declarative node/edge list for the rendering surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WaitForGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WaitForGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn thread_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Thread { .. }))
            .count()
    }

    pub fn lock_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Lock { .. }))
            .count()
    }

    pub fn deadlocked_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_deadlocked()).count()
    }
}

/// Build the wait-for graph for `snapshot`.
///
/// Lock nodes come first from the snapshot's lock list (first record per
/// identity wins), then from any identity a thread references that the
/// list lacks. Every edge endpoint therefore names an existing node.
pub fn build(snapshot: &Snapshot) -> WaitForGraph {
    let mut graph = WaitForGraph::default();

    let mut threads_seen = HashSet::new();
    for thread in &snapshot.threads {
        if threads_seen.insert(thread.id) {
            graph.nodes.push(thread_node(thread));
        }
    }

    let mut lock_ids: HashMap<LockIdentity, NodeId> = HashMap::new();
    for lock in &snapshot.locks {
        resolve_lock(&mut graph, &mut lock_ids, lock);
    }

    for thread in &snapshot.threads {
        let thread_id = NodeId::thread(thread.id);

        if let Some(waiting) = &thread.waiting_lock {
            let lock_id = resolve_lock(&mut graph, &mut lock_ids, waiting);
            graph.edges.push(GraphEdge {
                source: thread_id.clone(),
                target: lock_id,
                kind: EdgeKind::Waiting,
            });
        }

        for owned in &thread.owned_locks {
            let lock_id = resolve_lock(&mut graph, &mut lock_ids, owned);
            graph.edges.push(GraphEdge {
                source: lock_id,
                target: thread_id.clone(),
                kind: EdgeKind::Held,
            });
        }
    }

    tracing::trace!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Built wait-for graph",
    );

    graph
}

fn thread_node(thread: &ThreadInfo) -> GraphNode {
    GraphNode {
        id: NodeId::thread(thread.id),
        label: thread.display_name(),
        kind: NodeKind::Thread {
            state: thread.state,
            deadlocked: thread.is_deadlocked,
        },
    }
}

/// Look up the node for `lock`, emitting it on first sight.
fn resolve_lock(
    graph: &mut WaitForGraph,
    lock_ids: &mut HashMap<LockIdentity, NodeId>,
    lock: &LockInfo,
) -> NodeId {
    match lock_ids.entry(lock.identity_hash_code) {
        Entry::Occupied(entry) => entry.get().clone(),
        Entry::Vacant(entry) => {
            let id = NodeId::lock(lock.identity_hash_code);
            graph.nodes.push(GraphNode {
                id: id.clone(),
                label: lock.label(),
                kind: NodeKind::Lock {
                    class_name: lock.class_name.clone(),
                },
            });
            entry.insert(id).clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::LockRef;

    fn thread(id: ThreadId, waiting: Option<LockIdentity>, owned: &[LockIdentity]) -> ThreadInfo {
        ThreadInfo {
            id,
            name: format!("T{id}"),
            state: if waiting.is_some() {
                ThreadState::Blocked
            } else {
                ThreadState::Runnable
            },
            is_deadlocked: false,
            waiting_lock: waiting.map(|code| LockRef::new(code, "java.lang.Object")),
            owned_locks: owned
                .iter()
                .map(|code| LockRef::new(*code, "java.lang.Object"))
                .collect(),
            stack_trace: Vec::new(),
        }
    }

    fn edge_set(graph: &WaitForGraph) -> HashSet<GraphEdge> {
        graph.edges.iter().cloned().collect()
    }

    fn node_ids(graph: &WaitForGraph) -> HashSet<NodeId> {
        graph.nodes.iter().map(|n| n.id.clone()).collect()
    }

    #[test]
    fn waiting_and_held_edges() {
        // T1 waits on L1, T2 holds L1.
        let snapshot = Snapshot {
            threads: vec![thread(1, Some(1), &[]), thread(2, None, &[1])],
            locks: vec![LockInfo::new(1, "java.lang.Object")],
            ..Default::default()
        };

        let graph = build(&snapshot);

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(
            graph.edges[0],
            GraphEdge {
                source: NodeId::thread(1),
                target: NodeId::lock(1),
                kind: EdgeKind::Waiting,
            }
        );
        assert_eq!(
            graph.edges[1],
            GraphEdge {
                source: NodeId::lock(1),
                target: NodeId::thread(2),
                kind: EdgeKind::Held,
            }
        );
    }

    #[test]
    fn edge_count_matches_references() {
        let snapshot = Snapshot {
            threads: vec![
                thread(1, Some(10), &[20, 30]),
                thread(2, Some(20), &[10]),
                thread(3, None, &[]),
                thread(4, Some(30), &[40, 50, 60]),
            ],
            locks: vec![LockInfo::new(10, "a.A"), LockInfo::new(20, "b.B")],
            ..Default::default()
        };

        let expected: usize = snapshot
            .threads
            .iter()
            .map(|t| usize::from(t.waiting_lock.is_some()) + t.owned_locks.len())
            .sum();

        assert_eq!(build(&snapshot).edges.len(), expected);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let snapshot = Snapshot {
            threads: vec![thread(1, Some(2), &[1]), thread(2, Some(1), &[2])],
            locks: vec![LockInfo::new(1, "x.Lock"), LockInfo::new(2, "x.Lock")],
            ..Default::default()
        };

        let first = build(&snapshot);
        let second = build(&snapshot);

        assert_eq!(node_ids(&first), node_ids(&second));
        assert_eq!(edge_set(&first), edge_set(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn same_identity_shares_one_node() {
        let snapshot = Snapshot {
            threads: vec![thread(1, Some(7), &[]), thread(2, None, &[7])],
            locks: vec![
                LockInfo::new(7, "first.Winner"),
                LockInfo::new(7, "second.Loser"),
            ],
            ..Default::default()
        };

        let graph = build(&snapshot);

        assert_eq!(graph.lock_count(), 1);
        let lock = graph.node(&NodeId::lock(7)).unwrap();
        assert_eq!(lock.label, "Winner");
        assert!(graph.edges.iter().all(|e| e.source == NodeId::lock(7)
            || e.target == NodeId::lock(7)));
    }

    #[test]
    fn unlisted_lock_is_synthesized() {
        let snapshot = Snapshot {
            threads: vec![thread(1, Some(99), &[98])],
            locks: Vec::new(),
            ..Default::default()
        };

        let graph = build(&snapshot);

        assert!(graph.contains(&NodeId::lock(99)));
        assert!(graph.contains(&NodeId::lock(98)));
        for edge in &graph.edges {
            assert!(graph.contains(&edge.source), "dangling source {}", edge.source);
            assert!(graph.contains(&edge.target), "dangling target {}", edge.target);
        }
    }

    #[test]
    fn unreferenced_listed_lock_still_gets_a_node() {
        let snapshot = Snapshot {
            threads: vec![thread(1, None, &[])],
            locks: vec![LockInfo::new(5, "java.util.concurrent.locks.ReentrantLock")],
            ..Default::default()
        };

        let graph = build(&snapshot);

        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.node(&NodeId::lock(5)).unwrap().label, "ReentrantLock");
    }

    #[test]
    fn deadlocked_flag_propagates() {
        let mut t = thread(1, Some(1), &[]);
        t.is_deadlocked = true;
        let snapshot = Snapshot {
            threads: vec![t, thread(2, None, &[])],
            ..Default::default()
        };

        let graph = build(&snapshot);

        assert_eq!(graph.deadlocked_count(), 1);
        assert!(graph.node(&NodeId::thread(1)).unwrap().is_deadlocked());
        assert!(!graph.node(&NodeId::thread(2)).unwrap().is_deadlocked());
    }

    #[test]
    fn empty_snapshot_gives_empty_graph() {
        assert!(build(&Snapshot::default()).is_empty());
    }

    #[test]
    fn node_serializes_with_type_tag() {
        let snapshot = Snapshot {
            threads: vec![thread(3, None, &[])],
            ..Default::default()
        };
        let json = serde_json::to_value(&build(&snapshot).nodes[0]).unwrap();
        assert_eq!(json["id"], "thread-3");
        assert_eq!(json["type"], "thread");
        assert_eq!(json["state"], "RUNNABLE");
        assert_eq!(json["deadlocked"], false);
    }
}
