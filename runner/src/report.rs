//! JSON summary of a finished run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::classifier::Outcome;
use crate::core::graph::{Counts, LeafState, NodeId, NodeKind, RunTree};
use crate::core::path::full_path;
use crate::run::RunResult;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_dir: Option<PathBuf>,
    pub counts: Counts,
    pub root: NodeReport,
}

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub name: String,
    /// Dotted path from the root of the full suite.
    pub path: String,
    #[serde(flatten)]
    pub detail: NodeDetail,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeDetail {
    Test {
        state: LeafState,
        outcome: Option<Outcome>,
        /// Human-readable outcome, as shown in the terminal.
        label: Option<String>,
        elapsed_ms: Option<u64>,
        pid: Option<u32>,
        /// Log file, unless it was pruned for being empty.
        log: Option<PathBuf>,
    },
    Group {
        counts: Counts,
        children: Vec<NodeReport>,
    },
}

pub fn build_report(result: &RunResult) -> RunReport {
    RunReport {
        run_dir: result.run_dir.clone(),
        counts: result.counts(),
        root: node_report(&result.tree, result.tree.root()),
    }
}

fn node_report(tree: &RunTree, id: NodeId) -> NodeReport {
    let node = tree.node(id);
    let detail = match &node.kind {
        NodeKind::Leaf(leaf) => NodeDetail::Test {
            state: leaf.state,
            outcome: leaf.outcome,
            label: leaf.outcome.map(|outcome| outcome.to_string()),
            elapsed_ms: node
                .elapsed()
                .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
            pid: leaf.pid,
            log: leaf.log_path.clone().filter(|path| path.is_file()),
        },
        NodeKind::Internal(internal) => NodeDetail::Group {
            counts: node.counts(),
            children: internal
                .children
                .iter()
                .map(|child| node_report(tree, *child))
                .collect(),
        },
    };
    NodeReport {
        name: node.name.clone(),
        path: full_path(tree, id),
        detail,
    }
}

/// Serialize the report to pretty-printed JSON with trailing newline.
pub fn write_report(path: &Path, result: &RunResult) -> Result<()> {
    let mut payload =
        serde_json::to_string_pretty(&build_report(result)).context("serialize report")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write report {}", path.display()))?;
    Ok(())
}
