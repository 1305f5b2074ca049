//! Mutable runtime tree built fresh for every run.
//!
//! Nodes live in an arena indexed by [`NodeId`]; the parent link is an index,
//! so ownership only flows from the tree to its nodes. Leaf and internal nodes
//! carry disjoint payloads ([`NodeKind`]).

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::classifier::Outcome;
use crate::error::EngineError;
use crate::suite::{Runnable, Suite, SuiteKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Leaf lifecycle. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafState {
    Idle,
    Running,
    Done,
}

#[derive(Debug)]
pub struct RunNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub start: Option<Instant>,
    pub end: Option<Instant>,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Leaf(Leaf),
    Internal(Internal),
}

#[derive(Debug)]
pub struct Leaf {
    pub runnable: Runnable,
    pub state: LeafState,
    pub pid: Option<u32>,
    /// Raw termination status; set when the leaf is done.
    pub exit_status: Option<ExitStatus>,
    pub outcome: Option<Outcome>,
    pub log_path: Option<PathBuf>,
    /// Spinner phase (0-3), advanced by the renderer.
    pub spinner: u8,
}

#[derive(Debug)]
pub struct Internal {
    pub children: Vec<NodeId>,
    pub total_leaves: usize,
    pub num_passed: usize,
    pub num_failed: usize,
}

/// Aggregate counts for any node. A leaf counts as one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Counts {
    pub fn running(&self) -> usize {
        self.total - self.passed - self.failed
    }

    pub fn finished(&self) -> usize {
        self.passed + self.failed
    }
}

impl RunNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn as_internal(&self) -> Option<&Internal> {
        match &self.kind {
            NodeKind::Internal(internal) => Some(internal),
            NodeKind::Leaf(_) => None,
        }
    }

    /// Wall time between start and end, once both are known.
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }

    pub fn counts(&self) -> Counts {
        match &self.kind {
            NodeKind::Internal(internal) => Counts {
                total: internal.total_leaves,
                passed: internal.num_passed,
                failed: internal.num_failed,
            },
            NodeKind::Leaf(leaf) => {
                let (passed, failed) = match leaf.outcome {
                    Some(outcome) if outcome.passed() => (1, 0),
                    Some(_) => (0, 1),
                    None => (0, 0),
                };
                Counts {
                    total: 1,
                    passed,
                    failed,
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct RunTree {
    nodes: Vec<RunNode>,
    prefix: Option<String>,
}

/// Build a runtime tree from `suite` with a pre-order walk.
///
/// `prefix` is the dotted path of the suite's parent inside the full suite
/// when `suite` was selected by a filter; function leaves use it to name
/// themselves for re-execution.
pub fn build_graph(suite: &Suite, prefix: Option<&str>) -> RunTree {
    let mut tree = RunTree {
        nodes: Vec::new(),
        prefix: prefix.map(str::to_string),
    };
    tree.insert(None, suite);
    tree
}

impl RunTree {
    fn insert(&mut self, parent: Option<NodeId>, suite: &Suite) -> (NodeId, usize) {
        let id = NodeId(self.nodes.len());
        let kind = match &suite.kind {
            SuiteKind::Leaf(runnable) => NodeKind::Leaf(Leaf {
                runnable: runnable.clone(),
                state: LeafState::Idle,
                pid: None,
                exit_status: None,
                outcome: None,
                log_path: None,
                spinner: 0,
            }),
            SuiteKind::Group(_) => NodeKind::Internal(Internal {
                children: Vec::new(),
                total_leaves: 0,
                num_passed: 0,
                num_failed: 0,
            }),
        };
        self.nodes.push(RunNode {
            name: suite.name.clone(),
            parent,
            start: None,
            end: None,
            kind,
        });

        let SuiteKind::Group(children) = &suite.kind else {
            return (id, 1);
        };
        let mut ids = Vec::with_capacity(children.len());
        let mut total = 0;
        for child in children {
            let (child_id, leaves) = self.insert(Some(id), child);
            ids.push(child_id);
            total += leaves;
        }
        if let NodeKind::Internal(internal) = &mut self.nodes[id.0].kind {
            internal.children = ids;
            internal.total_leaves = total;
        }
        (id, total)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &RunNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut RunNode {
        &mut self.nodes[id.0]
    }

    pub fn leaf(&self, id: NodeId) -> Option<&Leaf> {
        self.node(id).as_leaf()
    }

    pub(crate) fn leaf_mut(&mut self, id: NodeId) -> Option<&mut Leaf> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Internal(_) => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Internal(internal) => &internal.children,
            NodeKind::Leaf(_) => &[],
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Node ids in pre-order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Leaf ids in pre-order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(|id| self.node(*id).is_leaf())
    }

    /// Counts at the root.
    pub fn counts(&self) -> Counts {
        self.node(self.root()).counts()
    }

    pub fn total_leaves(&self) -> usize {
        self.counts().total
    }

    /// True once every leaf has been marked done.
    pub fn is_complete(&self) -> bool {
        let counts = self.counts();
        counts.finished() == counts.total
    }

    /// Names from the runtime root down to `id`, inclusive.
    pub fn segments(&self, id: NodeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        names
    }

    /// Find the running leaf whose process has `pid`. Done leaves are skipped
    /// so a pid reused within one run maps to the live process.
    pub fn find_by_pid(&self, pid: u32) -> Option<NodeId> {
        self.find_by_pid_from(self.root(), pid)
    }

    fn find_by_pid_from(&self, id: NodeId, pid: u32) -> Option<NodeId> {
        match &self.node(id).kind {
            NodeKind::Leaf(leaf) => {
                (leaf.state == LeafState::Running && leaf.pid == Some(pid)).then_some(id)
            }
            NodeKind::Internal(internal) => internal
                .children
                .iter()
                .find_map(|child| self.find_by_pid_from(*child, pid)),
        }
    }

    /// Idle -> Running.
    pub(crate) fn mark_running(&mut self, id: NodeId, pid: Option<u32>, start: Instant) {
        let node = self.node_mut(id);
        node.start = Some(start);
        if let NodeKind::Leaf(leaf) = &mut node.kind {
            debug_assert_eq!(leaf.state, LeafState::Idle, "leaf {} started twice", node.name);
            leaf.state = LeafState::Running;
            leaf.pid = pid;
        }
    }

    /// Running -> Done, then add the result to every ancestor.
    ///
    /// Callers hold the render lock (if any) across this call so the
    /// transition and the ancestor counts become visible together.
    pub(crate) fn complete(
        &mut self,
        id: NodeId,
        status: ExitStatus,
        end: Instant,
    ) -> Result<Outcome, EngineError> {
        let node = &mut self.nodes[id.0];
        let name = node.name.clone();
        let NodeKind::Leaf(leaf) = &mut node.kind else {
            return Err(EngineError::NotRunning { name });
        };
        match leaf.state {
            LeafState::Done => return Err(EngineError::DoubleCompletion { name }),
            LeafState::Idle => return Err(EngineError::NotRunning { name }),
            LeafState::Running => {}
        }
        let outcome = Outcome::classify(status)?;
        leaf.state = LeafState::Done;
        leaf.exit_status = Some(status);
        leaf.outcome = Some(outcome);
        node.end = Some(end);

        let mut cursor = node.parent;
        while let Some(ancestor) = cursor {
            let node = &mut self.nodes[ancestor.0];
            if let NodeKind::Internal(internal) = &mut node.kind {
                if outcome.passed() {
                    internal.num_passed += 1;
                } else {
                    internal.num_failed += 1;
                }
            }
            cursor = node.parent;
        }
        Ok(outcome)
    }
}
