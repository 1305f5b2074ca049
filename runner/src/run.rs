//! One run of a suite, start to finish.
//!
//! ```text
//! validate options -> select subtree -> build run tree
//!   in-process: run leaves sequentially
//!   otherwise:  create log dirs -> launch all -> [render thread]
//!               -> collect completions -> final frame -> check counts
//!               -> prune empty logs
//! ```

use std::env;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use tracing::{error, info, instrument, warn};

use crate::core::graph::{Counts, NodeId, RunTree, build_graph};
use crate::core::invariants::{validate_run_tree, validate_suite};
use crate::core::path::{parent_prefix, resolve_node, resolve_suite};
use crate::display::{Board, Display, RenderThread, SharedBoard};
use crate::error::EngineError;
use crate::exit_codes;
use crate::harness::LEAF_ENV;
use crate::io::config::RunOptions;
use crate::io::logs::LogLayout;
use crate::io::process::ProcessGroup;
use crate::scheduler::{collect, launch, run_in_process};
use crate::suite::Suite;

/// Final state of a run.
#[derive(Debug)]
pub struct RunResult {
    pub tree: RunTree,
    /// `None` for in-process runs, which write no logs.
    pub run_dir: Option<PathBuf>,
}

impl RunResult {
    pub fn counts(&self) -> Counts {
        self.tree.counts()
    }

    pub fn all_passed(&self) -> bool {
        let counts = self.counts();
        counts.passed == counts.total
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            exit_codes::OK
        } else {
            exit_codes::FAILED
        }
    }

    /// Runtime node at a dotted path (relative to the run's root).
    pub fn node(&self, path: &str) -> Option<NodeId> {
        resolve_node(&self.tree, path)
    }

    /// Log file of the leaf at `path`, if it survived pruning.
    pub fn log_path(&self, path: &str) -> Option<&Path> {
        let id = self.node(path)?;
        let log = self.tree.leaf(id)?.log_path.as_deref()?;
        log.is_file().then_some(log)
    }
}

/// Run `suite` with frames and messages on stdout.
pub fn run(suite: &Arc<Suite>, options: &RunOptions) -> Result<RunResult> {
    run_with(suite, options, Display::stdout(options.color))
}

/// Run `suite` with frames and messages written to `out`.
pub fn run_to<W>(suite: &Arc<Suite>, options: &RunOptions, out: W) -> Result<RunResult>
where
    W: Write + Send + 'static,
{
    run_with(suite, options, Display::new(Box::new(out), options.color))
}

/// Pick the subtree named by `filter` and the dotted path of its parent.
pub fn select<'a>(suite: &Arc<Suite>, filter: Option<&'a str>) -> Result<(Arc<Suite>, Option<&'a str>)> {
    let Some(filter) = filter else {
        return Ok((Arc::clone(suite), None));
    };
    match resolve_suite(suite, filter) {
        Some(selected) => Ok((selected, parent_prefix(filter))),
        None => bail!("filter {filter} does not name a node of suite {}", suite.name),
    }
}

/// Refuse to start a run inside a re-executed function leaf.
///
/// A binary that never calls [`run_leaf_if_requested`] would otherwise run
/// its whole suite again in every leaf, and so on without end.
///
/// [`run_leaf_if_requested`]: crate::harness::run_leaf_if_requested
pub fn ensure_not_in_leaf(leaf: Option<&OsStr>) -> Result<()> {
    if let Some(leaf) = leaf {
        bail!(
            "this process was started to run test {} ({LEAF_ENV} is set) but is starting a whole run; \
             call harness::run_leaf_if_requested (or harness::run_main) before running the suite",
            leaf.to_string_lossy()
        );
    }
    Ok(())
}

#[instrument(skip_all, fields(suite = %suite.name))]
fn run_with(suite: &Arc<Suite>, options: &RunOptions, mut display: Display) -> Result<RunResult> {
    ensure_not_in_leaf(env::var_os(LEAF_ENV).as_deref())?;
    options.validate()?;
    let problems = validate_suite(suite);
    if !problems.is_empty() {
        bail!("invalid suite:\n- {}", problems.join("\n- "));
    }
    let (selected, prefix) = select(suite, options.filter.as_deref())?;
    let mut tree = build_graph(&selected, prefix);
    info!(leaves = tree.total_leaves(), no_fork = options.no_fork, "run starting");

    if options.no_fork {
        run_in_process(&mut tree, &mut display)?;
        return Ok(RunResult { tree, run_dir: None });
    }

    let layout = LogLayout::create(options.dir.as_deref())?;
    display.message(&format!(
        "running suite and outputting logs to {}",
        layout.run_dir().display()
    ))?;

    let mut processes = ProcessGroup::new();
    if let Err(err) = launch(&mut tree, &layout, &mut processes) {
        error!(err = %format!("{err:#}"), started = processes.len(), "launch failed, terminating started tests");
        processes.terminate_all();
        return Err(err);
    }

    let total = tree.total_leaves();
    let board = Board { tree, display };
    let (mut shared, renderer) = if options.animate {
        let shared = Arc::new(Mutex::new(board));
        match options
            .frame_interval()
            .and_then(|interval| RenderThread::spawn(Arc::clone(&shared), interval))
        {
            Ok(renderer) => (SharedBoard::Locked(shared), Some(renderer)),
            Err(err) => {
                processes.terminate_all();
                return Err(err);
            }
        }
    } else {
        (SharedBoard::Local(board), None)
    };

    let collected = collect(&mut shared, &mut processes, total);
    let stopped = renderer.map_or(Ok(()), RenderThread::stop);
    if let Err(err) = collected {
        error!(err = %format!("{err:#}"), "collecting completions failed, terminating remaining tests");
        processes.terminate_all();
        return Err(err);
    }
    // Stopped leaves count as done but are still alive.
    processes.terminate_all();
    if let Err(err) = stopped {
        warn!(err = %format!("{err:#}"), "render thread stopped with an error");
    }

    let mut board = shared.into_board()?;
    board.render().context("render final frame")?;

    let violations = validate_run_tree(&board.tree);
    if !violations.is_empty() {
        return Err(EngineError::Invariants(violations).into());
    }

    layout.prune(&board.tree)?;
    let counts = board.tree.counts();
    info!(passed = counts.passed, failed = counts.failed, "run finished");
    board.display.message(&format!(
        "Test results written to:\n{}",
        layout.run_dir().display()
    ))?;

    Ok(RunResult {
        tree: board.tree,
        run_dir: Some(layout.run_dir().to_path_buf()),
    })
}
