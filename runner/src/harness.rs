//! Entry point for test binaries that declare their suite in Rust.
//!
//! ```no_run
//! use suite_runner::{Suite, harness};
//!
//! fn parses() { assert_eq!("1".parse::<i32>().ok(), Some(1)); }
//!
//! fn main() {
//!     let suite = Suite::group("all", [Suite::test("parses", parses)]);
//!     std::process::exit(harness::run_main(&suite));
//! }
//! ```
//!
//! The engine runs each function leaf by re-executing the binary with
//! [`LEAF_ENV`] set to the leaf's dotted path; `run_main` notices the variable
//! and runs that one function instead of the whole suite.

use std::panic;
use std::sync::Arc;

use clap::Parser;

use crate::cli::{RunArgs, execute};
use crate::core::path::resolve_suite;
use crate::exit_codes;
use crate::io::config::RunOptions;
use crate::logging;
use crate::suite::{Runnable, Suite, SuiteKind};

/// Names the leaf a re-executed test binary should run.
pub const LEAF_ENV: &str = "SUITE_RUNNER_LEAF";

#[derive(Parser)]
#[command(about = "Run this binary's test suite")]
struct HarnessCli {
    #[command(flatten)]
    run: RunArgs,
}

/// Run the leaf named by [`LEAF_ENV`] if set, otherwise parse the command
/// line and run the whole suite. Returns the process exit code.
pub fn run_main(suite: &Arc<Suite>) -> i32 {
    if let Some(code) = run_leaf_if_requested(suite) {
        return code;
    }
    logging::init();
    let cli = HarnessCli::parse();
    let options = cli.run.apply(RunOptions::default());
    execute(suite, &options, cli.run.report.as_deref())
}

/// Exit code of the requested leaf, or `None` when this process is not a
/// re-executed leaf.
pub fn run_leaf_if_requested(suite: &Arc<Suite>) -> Option<i32> {
    let path = std::env::var(LEAF_ENV).ok()?;
    Some(run_leaf(suite, &path))
}

fn run_leaf(suite: &Arc<Suite>, path: &str) -> i32 {
    let Some(node) = resolve_suite(suite, path) else {
        eprintln!("no test at {path} in suite {}", suite.name);
        return exit_codes::INVALID;
    };
    let SuiteKind::Leaf(Runnable::Function(test)) = &node.kind else {
        eprintln!("{path} is not a function test");
        return exit_codes::INVALID;
    };
    match panic::catch_unwind(*test) {
        Ok(()) => exit_codes::OK,
        Err(_) => exit_codes::PANICKED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::CommandSpec;

    fn passes() {}

    fn panics() {
        panic!("expected failure");
    }

    fn suite() -> Arc<Suite> {
        Suite::group(
            "all",
            [
                Suite::test("passes", passes),
                Suite::test("panics", panics),
                Suite::command("external", CommandSpec::new("true")),
            ],
        )
    }

    #[test]
    fn runs_the_named_function() {
        assert_eq!(run_leaf(&suite(), "all.passes"), exit_codes::OK);
    }

    #[test]
    fn panics_map_to_panic_exit_code() {
        assert_eq!(run_leaf(&suite(), "all.panics"), exit_codes::PANICKED);
    }

    #[test]
    fn unknown_or_non_function_paths_are_invalid() {
        assert_eq!(run_leaf(&suite(), "all.missing"), exit_codes::INVALID);
        assert_eq!(run_leaf(&suite(), "all.external"), exit_codes::INVALID);
        assert_eq!(run_leaf(&suite(), "all"), exit_codes::INVALID);
    }
}
