//! Classification of a finished leaf process.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use serde::Serialize;

use crate::error::EngineError;

/// How a leaf process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Outcome {
    /// Normal exit with status 0.
    Passed,
    /// Normal exit with a nonzero status.
    Exited(i32),
    /// Killed by a signal.
    Terminated(i32),
    /// Stopped by a signal (job control).
    Stopped(i32),
}

impl Outcome {
    /// Classify a raw termination status.
    ///
    /// `continued` notifications and anything else that is neither an exit,
    /// a signal termination nor a stop are rejected.
    pub fn classify(status: ExitStatus) -> Result<Outcome, EngineError> {
        if let Some(code) = status.code() {
            return Ok(if code == 0 {
                Outcome::Passed
            } else {
                Outcome::Exited(code)
            });
        }
        if let Some(signal) = status.signal() {
            return Ok(Outcome::Terminated(signal));
        }
        if let Some(signal) = status.stopped_signal() {
            return Ok(Outcome::Stopped(signal));
        }
        Err(EngineError::UnrecognizedStatus {
            raw: status.into_raw(),
        })
    }

    pub fn passed(self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::Exited(code) => write!(f, "exited: code {code}"),
            Outcome::Terminated(signal) => write!(f, "terminated: {}", signal_name(signal)),
            Outcome::Stopped(signal) => write!(f, "stopped: {}", signal_name(signal)),
        }
    }
}

/// Conventional name of a Linux signal number, or `signal N`.
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        5 => "SIGTRAP",
        6 => "SIGABRT",
        7 => "SIGBUS",
        8 => "SIGFPE",
        9 => "SIGKILL",
        10 => "SIGUSR1",
        11 => "SIGSEGV",
        12 => "SIGUSR2",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        17 => "SIGCHLD",
        18 => "SIGCONT",
        19 => "SIGSTOP",
        20 => "SIGTSTP",
        21 => "SIGTTIN",
        22 => "SIGTTOU",
        24 => "SIGXCPU",
        25 => "SIGXFSZ",
        _ => return format!("signal {signal}"),
    };
    name.to_string()
}
