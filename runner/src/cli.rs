//! Command-line options shared by the `suite-runner` binary and test binaries
//! built on [`harness::run_main`](crate::harness::run_main).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;

use crate::exit_codes;
use crate::io::config::{ColorMode, RunOptions};
use crate::report::write_report;
use crate::run::run;
use crate::suite::Suite;

/// Run options; unset flags keep the value from the suite file or the
/// default.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Redraw progress periodically (1) or only when a test finishes (0).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub animate: Option<u8>,

    /// Redraw rate when animating.
    #[arg(long)]
    pub fps: Option<f32>,

    /// Run tests sequentially in this process without capturing output.
    #[arg(long = "nofork")]
    pub no_fork: bool,

    /// Root directory for test logs (default: ./test_logs).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Only run the subtree at this dotted path, e.g. `all.unit.parser`.
    #[arg(long)]
    pub filter: Option<String>,

    /// Color and clear the screen between frames.
    #[arg(long, value_enum)]
    pub color: Option<ColorMode>,

    /// Write a JSON summary of the run to this file.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl RunArgs {
    /// Overlay the flags that were given onto `options`.
    pub fn apply(&self, mut options: RunOptions) -> RunOptions {
        if let Some(animate) = self.animate {
            options.animate = animate == 1;
        }
        if let Some(fps) = self.fps {
            options.fps = fps;
        }
        if self.no_fork {
            options.no_fork = true;
        }
        if let Some(dir) = &self.dir {
            options.dir = Some(dir.clone());
        }
        if let Some(filter) = &self.filter {
            options.filter = Some(filter.clone());
        }
        if let Some(color) = self.color {
            options.color = color;
        }
        options
    }
}

/// Run `suite`, write the optional report and map the result to an exit code.
pub fn execute(suite: &Arc<Suite>, options: &RunOptions, report: Option<&Path>) -> i32 {
    let result = match run(suite, options) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::INVALID;
        }
    };
    if let Some(path) = report
        && let Err(err) = write_report(path, &result)
    {
        eprintln!("{err:#}");
        return exit_codes::INVALID;
    }
    result.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn flags_override_file_options() {
        let cli = Harness::parse_from([
            "t", "--animate", "0", "--nofork", "--filter", "all.a", "--color", "never",
        ]);
        let options = cli.run.apply(RunOptions {
            fps: 12.0,
            ..RunOptions::default()
        });
        assert!(!options.animate);
        assert!(options.no_fork);
        assert_eq!(options.fps, 12.0);
        assert_eq!(options.filter.as_deref(), Some("all.a"));
        assert_eq!(options.color, ColorMode::Never);
    }

    #[test]
    fn no_flags_keep_options() {
        let cli = Harness::parse_from(["t"]);
        let options = cli.run.apply(RunOptions::default());
        assert_eq!(options, RunOptions::default());
    }

    #[test]
    fn animate_accepts_only_zero_or_one() {
        assert!(Harness::try_parse_from(["t", "--animate", "2"]).is_err());
    }
}
