//! Stable exit codes for the runner CLI and test harness binaries.

/// Every selected test passed.
pub const OK: i32 = 0;
/// The run completed and at least one test failed.
pub const FAILED: i32 = 1;
/// Bad arguments, bad suite, or an infrastructure error aborted the run.
pub const INVALID: i32 = 2;
/// A function leaf panicked inside its child process.
pub const PANICKED: i32 = 101;
