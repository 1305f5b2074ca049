//! Parallel test-suite runner.
//!
//! A [`Suite`] is a declared tree of named tests. Each run builds a fresh
//! runtime tree from it, starts every test at once in its own process with
//! output captured to a per-test log file, and redraws a live view of the
//! tree as results arrive. Failures are contained: a test that exits nonzero
//! or dies from a signal is recorded and reported, never fatal to the run.
//!
//! - **[`core`]**: Pure logic (runtime tree, path resolution, outcome
//!   classification, frame rendering, invariants). No I/O.
//! - **[`io`]**: Side effects (log directories, child processes, options and
//!   suite files).
//!
//! [`run`](mod@run), [`scheduler`] and [`display`] coordinate the two; [`harness`] and
//! the `suite-runner` binary are the entry points.

pub mod cli;
pub mod core;
pub mod display;
pub mod error;
pub mod exit_codes;
pub mod harness;
pub mod io;
pub mod logging;
pub mod report;
pub mod run;
pub mod scheduler;
pub mod suite;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::error::EngineError;
pub use crate::io::config::{ColorMode, RunOptions};
pub use crate::run::{RunResult, run, run_to};
pub use crate::suite::{CommandSpec, Runnable, Suite, SuiteKind};
