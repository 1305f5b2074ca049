//! Launching leaves and collecting their completions.
//!
//! The launch phase walks the runtime tree depth-first and starts every leaf
//! at once; nothing else is running yet, so it needs no locking. The
//! completion phase then applies one result per finished child under the
//! board lock and redraws.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::graph::{NodeId, NodeKind, RunTree};
use crate::core::path::{full_path, node_path};
use crate::display::{Board, Display, SharedBoard};
use crate::error::EngineError;
use crate::io::logs::{LogLayout, create_log, ensure_node_dir};
use crate::io::process::ProcessGroup;
use crate::suite::Runnable;

/// Start every leaf of `tree` with its output in its log file.
///
/// Stops at the first failure; children already started stay in
/// `processes` so the caller can terminate them.
#[instrument(skip_all, fields(leaves = tree.total_leaves()))]
pub fn launch(tree: &mut RunTree, layout: &LogLayout, processes: &mut ProcessGroup) -> Result<()> {
    let root = tree.root();
    launch_node(tree, root, layout, processes)
}

fn launch_node(
    tree: &mut RunTree,
    id: NodeId,
    layout: &LogLayout,
    processes: &mut ProcessGroup,
) -> Result<()> {
    let path = layout.node_path(tree, id);
    if let Some(internal) = tree.node(id).as_internal() {
        let children = internal.children.clone();
        ensure_node_dir(&path)?;
        for child in children {
            launch_node(tree, child, layout, processes)?;
        }
        return Ok(());
    }

    let name = node_path(tree, id);
    let cmd = match tree.leaf(id) {
        Some(leaf) => leaf.runnable.to_command(&full_path(tree, id))?,
        None => return Ok(()),
    };
    let start = Instant::now();
    let log = create_log(&path)?;
    let pid = processes
        .spawn(cmd, log)
        .with_context(|| format!("failed to start test {name}"))?;
    tree.mark_running(id, Some(pid), start);
    if let Some(leaf) = tree.leaf_mut(id) {
        leaf.log_path = Some(path);
    }
    debug!(test = %name, pid, "test started");
    Ok(())
}

/// Block on completions until every leaf of the board's tree is done.
///
/// Completions for unknown pids are logged and skipped, as are
/// continued-process notifications; neither counts toward the total.
#[instrument(skip_all, fields(total = total))]
pub fn collect(board: &mut SharedBoard, processes: &mut ProcessGroup, total: usize) -> Result<()> {
    let mut done = 0;
    while done < total {
        let completion = processes.wait_any().map_err(|err| EngineError::WaitFailed {
            done,
            total,
            reason: err.to_string(),
        })?;

        let counted =
            board.with(|board| apply_completion(board, completion.pid, completion.status))??;
        if counted {
            done += 1;
        }
    }
    Ok(())
}

fn apply_completion(board: &mut Board, pid: u32, status: ExitStatus) -> Result<bool> {
    let Some(id) = board.tree.find_by_pid(pid) else {
        warn!(pid, raw = status.into_raw(), "got a completion for a process that is not a test, ignoring");
        return Ok(false);
    };
    let name = node_path(&board.tree, id);
    if status.continued() {
        info!(test = %name, "test process was continued");
        return Ok(false);
    }
    let outcome = board.tree.complete(id, status, Instant::now())?;
    debug!(test = %name, %outcome, "test finished");
    board.render()?;
    Ok(true)
}

/// Run every leaf one after another in this process, without log capture.
///
/// Function leaves are called directly, so a panic ends the whole run;
/// command leaves inherit this process's stdio.
#[instrument(skip_all, fields(leaves = tree.total_leaves()))]
pub fn run_in_process(tree: &mut RunTree, display: &mut Display) -> Result<()> {
    let leaves: Vec<NodeId> = tree.leaves().collect();
    for id in leaves {
        let path = full_path(tree, id);
        let runnable = match &tree.node(id).kind {
            NodeKind::Leaf(leaf) => leaf.runnable.clone(),
            NodeKind::Internal(_) => continue,
        };
        display.testing(&path)?;
        tree.mark_running(id, None, Instant::now());
        let status = match runnable {
            Runnable::Function(test) => {
                test();
                ExitStatus::from_raw(0)
            }
            Runnable::Command(spec) => spec
                .to_command()
                .status()
                .with_context(|| format!("failed to run test {path}"))?,
        };
        let outcome = tree.complete(id, status, Instant::now())?;
        debug!(test = %path, %outcome, "test finished");
    }
    Ok(())
}
