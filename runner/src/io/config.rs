//! Run options: defaults, the `[run]` table of a suite file, and validation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// When frames are colored (and the terminal cleared between frames).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

/// Options for one run.
///
/// Missing fields in a `[run]` table take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Redraw the tree periodically from a background thread.
    pub animate: bool,

    /// Frames per second for `animate`; must be > 0 when animating.
    pub fps: f32,

    /// Run leaves one after another in this process, without isolation or
    /// log capture. Useful under a debugger.
    #[serde(rename = "nofork")]
    pub no_fork: bool,

    /// Root of the test log directories (default: `$PWD/test_logs`).
    pub dir: Option<PathBuf>,

    /// Dotted path of the subtree to run.
    pub filter: Option<String>,

    pub color: ColorMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            animate: true,
            fps: 30.0,
            no_fork: false,
            dir: None,
            filter: None,
            color: ColorMode::Auto,
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> Result<()> {
        if self.animate && !(self.fps > 0.0 && self.fps.is_finite()) {
            bail!(
                "fps ({}) must be greater than zero if progress rendering is on",
                self.fps
            );
        }
        if self.animate {
            self.frame_interval()?;
        }
        if let Some(filter) = &self.filter
            && filter.trim().is_empty()
        {
            bail!("filter must be a non-empty dotted path");
        }
        Ok(())
    }

    /// Time between two animation frames.
    pub fn frame_interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f32(1.0 / self.fps)
            .map_err(|err| anyhow!("fps ({}) gives no usable frame interval: {err}", self.fps))
    }
}
