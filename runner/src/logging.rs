//! Development-time tracing for debugging the engine.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. It is separate from
//! the product output: frames and run messages on stdout, and per-test logs
//! under the run directory (`io/logs`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`. Output: stderr, compact format. A
/// second call (e.g. a harness binary embedded in a larger program) is a
/// no-op.
///
/// # Example
/// ```bash
/// RUST_LOG=suite_runner=debug suite-runner --suite suite.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
