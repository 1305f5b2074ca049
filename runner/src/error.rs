//! Fatal engine conditions.
//!
//! Infrastructure failures (spawn, filesystem) travel as `anyhow` errors with
//! context. The variants here are the protocol violations a caller may want to
//! tell apart with `downcast_ref`. Test failures are never errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A leaf reported completion after it was already marked done.
    #[error("got a completion for test {name} but that test is already marked done")]
    DoubleCompletion { name: String },

    /// A completion arrived for a leaf that was never started.
    #[error("got a completion for test {name} but that test was never started")]
    NotRunning { name: String },

    /// The OS reported a status that is neither exit, signal nor stop.
    #[error("unknown process status for test: {raw}")]
    UnrecognizedStatus { raw: i32 },

    /// Waiting for child processes failed.
    #[error("failed to wait with {done}/{total} done: {reason}")]
    WaitFailed {
        done: usize,
        total: usize,
        reason: String,
    },

    /// The renderer was asked to draw a leaf before it was launched.
    #[error("test {name} must be running before it is rendered")]
    RenderIdle { name: String },

    /// Pruning removed the run directory that `latest` points to.
    #[error("test log root {} was deleted; this breaks the \"latest\" symlink", .path.display())]
    RunRootDeleted { path: PathBuf },

    /// Aggregate counts disagree with leaf states after the run.
    #[error("run tree invariants failed: {}", .0.join("; "))]
    Invariants(Vec<String>),
}
