//! On-disk log layout for a run.
//!
//! ```text
//! <root>/
//!   latest -> <root>/<run>            (absolute symlink)
//!   <run>/                            (16-digit microseconds since epoch)
//!     <suite>/<group>/<test>.txt      (stdout + stderr of one leaf)
//! ```
//!
//! Directories mirror internal nodes; every leaf owns one `.txt` file. Empty
//! logs, and directories left empty by them, are pruned after the run.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument};

use crate::core::graph::{NodeId, NodeKind, RunTree};
use crate::error::EngineError;

pub const DEFAULT_DIR: &str = "test_logs";
pub const LATEST: &str = "latest";
pub const LOG_EXTENSION: &str = "txt";

/// Directories of one run.
#[derive(Debug, Clone)]
pub struct LogLayout {
    root: PathBuf,
    run_dir: PathBuf,
}

/// Counts of artifacts removed by [`LogLayout::prune`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub files: usize,
    pub dirs: usize,
}

impl LogLayout {
    /// Resolve the log root, create a fresh run directory and point `latest`
    /// at it.
    ///
    /// `dir` defaults to `$PWD/test_logs`. The root may already exist; the run
    /// directory must not.
    #[instrument(skip_all)]
    pub fn create(dir: Option<&Path>) -> Result<Self> {
        let root = match dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir()
                .context("resolve current directory")?
                .join(DEFAULT_DIR),
        };
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create root test logs directory at {}", root.display()))?;
        let root = fs::canonicalize(&root)
            .with_context(|| format!("failed to convert directory to absolute path {}", root.display()))?;

        let run_dir = root.join(run_stamp());
        fs::create_dir(&run_dir).with_context(|| {
            format!(
                "failed to create test run directory for this run at {}",
                run_dir.display()
            )
        })?;
        debug!(run_dir = %run_dir.display(), "run directory created");

        let layout = Self { root, run_dir };
        layout.publish_latest()?;
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.root.join(LATEST)
    }

    /// Replace `<root>/latest` with a symlink to this run.
    fn publish_latest(&self) -> Result<()> {
        let link = self.latest_path();
        match fs::remove_file(&link) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| format!("remove old symlink {}", link.display()));
            }
        }
        symlink(&self.run_dir, &link).with_context(|| {
            format!(
                "failed to symlink target={}, link_name={}",
                self.run_dir.display(),
                link.display()
            )
        })
    }

    /// Filesystem path of a runtime node: a directory for internal nodes,
    /// `<name>.txt` for leaves.
    pub fn node_path(&self, tree: &RunTree, id: NodeId) -> PathBuf {
        let segments = tree.segments(id);
        let mut path = self.run_dir.clone();
        if let Some((last, ancestors)) = segments.split_last() {
            path.extend(ancestors);
            if tree.node(id).is_leaf() {
                path.push(format!("{last}.{LOG_EXTENSION}"));
            } else {
                path.push(last);
            }
        }
        path
    }

    /// Delete empty leaf logs, then directories whose children were all
    /// deleted, bottom-up. The run directory itself is never removed.
    ///
    /// Artifacts that are already gone count as deleted, so pruning twice is
    /// harmless.
    #[instrument(skip_all, fields(run_dir = %self.run_dir.display()))]
    pub fn prune(&self, tree: &RunTree) -> Result<PruneSummary> {
        let mut summary = PruneSummary::default();
        self.prune_node(tree, tree.root(), &mut summary)?;
        if !self.run_dir.is_dir() {
            return Err(EngineError::RunRootDeleted {
                path: self.run_dir.clone(),
            }
            .into());
        }
        debug!(files = summary.files, dirs = summary.dirs, "pruned empty logs");
        Ok(summary)
    }

    fn prune_node(&self, tree: &RunTree, id: NodeId, summary: &mut PruneSummary) -> Result<bool> {
        match &tree.node(id).kind {
            NodeKind::Leaf(leaf) => {
                let Some(path) = &leaf.log_path else {
                    return Ok(false);
                };
                let size = match fs::metadata(path) {
                    Ok(meta) => meta.len(),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
                    Err(err) => {
                        return Err(err).with_context(|| format!("inspect log {}", path.display()));
                    }
                };
                if size > 0 {
                    return Ok(false);
                }
                fs::remove_file(path)
                    .with_context(|| format!("failed to delete empty log {}", path.display()))?;
                summary.files += 1;
                Ok(true)
            }
            NodeKind::Internal(internal) => {
                let mut deleted = 0;
                for child in &internal.children {
                    if self.prune_node(tree, *child, summary)? {
                        deleted += 1;
                    }
                }
                if deleted < internal.children.len() {
                    return Ok(false);
                }
                let dir = self.node_path(tree, id);
                match fs::remove_dir(&dir) {
                    Ok(()) => {
                        summary.dirs += 1;
                        Ok(true)
                    }
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
                    Err(err) => Err(err)
                        .with_context(|| format!("failed to delete test log subdirectory {}", dir.display())),
                }
            }
        }
    }
}

/// Create the directory of an internal node; an existing one is reused.
pub fn ensure_node_dir(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "log directory already exists");
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to create log directory {}", path.display())),
    }
}

/// Create (or truncate) the log file of a leaf.
pub fn create_log(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to create log file at {}", path.display()))
}

/// Run directory name: microseconds since the epoch, zero-padded to 16 digits.
fn run_stamp() -> String {
    format!("{:016}", Utc::now().timestamp_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::build_graph;
    use crate::suite::Suite;
    use std::io::Write;

    fn noop() {}

    fn layout_in(temp: &tempfile::TempDir) -> LogLayout {
        LogLayout::create(Some(&temp.path().join("logs"))).expect("layout")
    }

    #[test]
    fn run_dir_is_sixteen_digits_and_latest_points_at_it() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp);
        let name = layout
            .run_dir()
            .file_name()
            .and_then(|name| name.to_str())
            .expect("name")
            .to_string();
        assert_eq!(name.len(), 16);
        assert!(name.chars().all(|c| c.is_ascii_digit()));

        let target = fs::read_link(layout.latest_path()).expect("read link");
        assert!(target.is_absolute());
        assert_eq!(target, layout.run_dir());
    }

    #[test]
    fn latest_moves_to_newest_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = layout_in(&temp);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = layout_in(&temp);
        assert_ne!(first.run_dir(), second.run_dir());
        let target = fs::read_link(second.latest_path()).expect("read link");
        assert_eq!(target, second.run_dir());
    }

    #[test]
    fn node_paths_mirror_the_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp);
        let suite = Suite::group("all", [Suite::group("ab", [Suite::test("a", noop)])]);
        let tree = build_graph(&suite, None);
        let leaf = tree.leaves().next().expect("leaf");
        assert_eq!(layout.node_path(&tree, leaf), layout.run_dir().join("all/ab/a.txt"));
        assert_eq!(layout.node_path(&tree, tree.root()), layout.run_dir().join("all"));
    }

    #[test]
    fn prune_removes_empty_logs_and_emptied_dirs_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp);
        let suite = Suite::group(
            "all",
            [
                Suite::group("quiet", [Suite::test("a", noop), Suite::test("b", noop)]),
                Suite::group("loud", [Suite::test("c", noop), Suite::test("d", noop)]),
            ],
        );
        let mut tree = build_graph(&suite, None);
        for id in tree.ids().collect::<Vec<_>>() {
            let path = layout.node_path(&tree, id);
            if tree.node(id).is_leaf() {
                let mut file = create_log(&path).expect("log");
                if tree.node(id).name == "d" {
                    writeln!(file, "hi").expect("write");
                }
                tree.leaf_mut(id).expect("leaf").log_path = Some(path);
            } else {
                ensure_node_dir(&path).expect("dir");
            }
        }

        let summary = layout.prune(&tree).expect("prune");
        assert_eq!(summary, PruneSummary { files: 3, dirs: 1 });
        assert!(!layout.run_dir().join("all/quiet").exists());
        assert!(!layout.run_dir().join("all/loud/c.txt").exists());
        assert!(layout.run_dir().join("all/loud/d.txt").is_file());

        let again = layout.prune(&tree).expect("prune twice");
        assert_eq!(again, PruneSummary::default());
        assert!(layout.run_dir().join("all/loud/d.txt").is_file());
    }

    #[test]
    fn prune_of_silent_suite_leaves_run_dir_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp);
        let suite = Suite::group("all", [Suite::test("a", noop)]);
        let mut tree = build_graph(&suite, None);
        ensure_node_dir(&layout.node_path(&tree, tree.root())).expect("dir");
        let leaf = tree.leaves().next().expect("leaf");
        let path = layout.node_path(&tree, leaf);
        create_log(&path).expect("log");
        tree.leaf_mut(leaf).expect("leaf").log_path = Some(path);

        layout.prune(&tree).expect("prune");
        assert!(layout.run_dir().is_dir());
        assert_eq!(fs::read_dir(layout.run_dir()).expect("read").count(), 0);
    }

    #[test]
    fn existing_node_dir_is_reused() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("group");
        ensure_node_dir(&dir).expect("create");
        ensure_node_dir(&dir).expect("reuse");
        assert!(dir.is_dir());
    }
}
