//! Child process plumbing: spawn a leaf with its output sent to a log file,
//! then wait for whichever child of the run changes state next.
//!
//! Every child of a run joins one process group, led by the first child.
//! Waiting on that group (`waitpid(-pgid)`) is a wait-for-any that only sees
//! this run's children, so concurrent runs in one process and unrelated
//! `Command`s never steal each other's exit statuses. No thread is needed per
//! child: the completion loop blocks in the wait itself.

use std::fs::File;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, error, instrument, warn};

/// One state change of a child: exit, signal death, stop or continue.
#[derive(Debug, Clone, Copy)]
pub struct Completion {
    pub pid: u32,
    pub status: ExitStatus,
}

/// The children of one run, grouped so they can be waited for together.
#[derive(Debug, Default)]
pub struct ProcessGroup {
    pgid: Option<Pid>,
    spawned: usize,
    /// Children not yet reaped; stopped children still count.
    outstanding: usize,
}

impl ProcessGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `cmd` into the group with stdin closed and stdout+stderr both
    /// appended to `log`. Returns the child's pid.
    ///
    /// The `Child` handle is dropped; the child is reaped by [`wait_any`]
    /// or [`terminate_all`].
    ///
    /// [`wait_any`]: Self::wait_any
    /// [`terminate_all`]: Self::terminate_all
    #[instrument(skip_all, fields(program = ?cmd.get_program()))]
    pub fn spawn(&mut self, mut cmd: Command, log: File) -> Result<u32> {
        let stderr = log.try_clone().context("duplicate log file handle")?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .process_group(self.pgid.map_or(0, Pid::as_raw));

        debug!("spawning child process");
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(err = %err, "failed to spawn command");
                return Err(err).context("spawn command");
            }
        };
        let pid = child.id();
        self.spawned += 1;
        self.outstanding += 1;
        if self.pgid.is_none() {
            let leader = i32::try_from(pid).context("child pid out of range")?;
            self.pgid = Some(Pid::from_raw(leader));
        }
        debug!(pid, pgid = ?self.pgid, "child started");
        Ok(pid)
    }

    /// Number of children spawned so far.
    pub fn len(&self) -> usize {
        self.spawned
    }

    pub fn is_empty(&self) -> bool {
        self.spawned == 0
    }

    /// Children that have not been reaped yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Block until any child of the group exits, dies, stops or continues.
    ///
    /// Interrupted waits are retried. `ECHILD` means the group has no
    /// children left to wait for.
    pub fn wait_any(&mut self) -> Result<Completion, Errno> {
        let pgid = self.pgid.ok_or(Errno::ECHILD)?;
        let flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
        loop {
            let status = match waitpid(Pid::from_raw(-pgid.as_raw()), Some(flags)) {
                Ok(status) => status,
                Err(Errno::EINTR) => continue,
                Err(err) => return Err(err),
            };
            let Some((pid, raw)) = encode_status(status) else {
                debug!(?status, "ignoring wait status");
                continue;
            };
            if matches!(status, WaitStatus::Exited(..) | WaitStatus::Signaled(..)) {
                self.outstanding = self.outstanding.saturating_sub(1);
            }
            let pid = u32::try_from(pid.as_raw()).map_err(|_| Errno::EINVAL)?;
            return Ok(Completion {
                pid,
                status: ExitStatus::from_raw(raw),
            });
        }
    }

    /// Kill and reap every child that has not been reaped yet.
    ///
    /// Stopped children are killed too. Does nothing once every child has
    /// been reaped, since the group id may then belong to someone else.
    #[instrument(skip_all, fields(outstanding = self.outstanding))]
    pub fn terminate_all(mut self) {
        let Some(pgid) = self.pgid else {
            return;
        };
        if self.outstanding == 0 {
            return;
        }
        warn!(pgid = pgid.as_raw(), "killing remaining children");
        if let Err(err) = killpg(pgid, Signal::SIGKILL) {
            warn!(err = %err, "failed to kill process group");
        }
        while self.outstanding > 0 {
            match waitpid(Pid::from_raw(-pgid.as_raw()), None) {
                Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) => self.outstanding -= 1,
                Ok(_) | Err(Errno::EINTR) => {}
                Err(err) => {
                    warn!(err = %err, left = self.outstanding, "failed to reap children");
                    return;
                }
            }
        }
    }
}

/// Pid and raw `wait` status word for a state change.
fn encode_status(status: WaitStatus) -> Option<(Pid, i32)> {
    match status {
        WaitStatus::Exited(pid, code) => Some((pid, (code & 0xff) << 8)),
        WaitStatus::Signaled(pid, signal, core_dumped) => {
            let core = if core_dumped { 0x80 } else { 0 };
            Some((pid, signal as i32 | core))
        }
        WaitStatus::Stopped(pid, signal) => Some((pid, ((signal as i32) << 8) | 0x7f)),
        WaitStatus::Continued(pid) => Some((pid, 0xffff)),
        _ => None,
    }
}
