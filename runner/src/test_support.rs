//! Test-only helpers for building suites and running them quietly.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;

use crate::io::config::{ColorMode, RunOptions};
use crate::run::{RunResult, run_to};
use crate::suite::{CommandSpec, Suite};

/// Command leaf running `script` under `sh -c`.
pub fn sh(name: &str, script: &str) -> Arc<Suite> {
    Suite::command(name, CommandSpec::shell(script))
}

/// Options for a non-animated, uncolored run with logs under `dir`.
pub fn quiet_options(dir: &Path) -> RunOptions {
    RunOptions {
        animate: false,
        color: ColorMode::Never,
        dir: Some(dir.to_path_buf()),
        ..RunOptions::default()
    }
}

/// Run `suite` with [`quiet_options`], discarding frames.
pub fn run_quiet(suite: &Arc<Suite>, dir: &Path) -> Result<RunResult> {
    run_to(suite, &quiet_options(dir), io::sink())
}

/// Writer whose contents stay readable after a display takes ownership of a
/// clone.
#[derive(Debug, Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    /// Everything written so far, lossily decoded.
    pub fn text(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Every file and directory below `dir`, relative to it, sorted.
pub fn entries_under(dir: &Path) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    collect_entries(dir, dir, &mut entries);
    entries.sort();
    entries
}

fn collect_entries(root: &Path, dir: &Path, entries: &mut Vec<PathBuf>) {
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };
    for entry in read.flatten() {
        let path = entry.path();
        if let Ok(relative) = path.strip_prefix(root) {
            entries.push(relative.to_path_buf());
        }
        if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
            collect_entries(root, &path, entries);
        }
    }
}
