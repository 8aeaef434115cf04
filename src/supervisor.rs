//! Child process supervision.
//!
//! The sandbox runs as a small fleet of children (the DNS override
//! process, one process per replay server, and the user's command), all
//! spawned after namespace setup so they inherit it. One child is the
//! *primary*: its exit ends the run and its status becomes the run's
//! status. Service children are expected to outlive the primary; one dying
//! early ends the run with that child's status instead.
//!
//! Teardown after the primary exits is SIGTERM, a short grace period, then
//! SIGKILL, and every remaining child is reaped before `run` returns.

use std::process::{Child, Command};
use std::thread;

use tracing::{debug, warn};

use crate::constants::SHUTDOWN_GRACE;
use crate::error::{Error, Result};

/// One supervised child.
struct Supervised {
    label: String,
    child: Child,
    primary: bool,
}

/// Registers and supervises the sandbox's child processes.
///
/// Children are spawned at registration time, in registration order, and
/// inherit the process state (namespace, privileges) current at that
/// moment.
#[derive(Default)]
pub struct Supervisor {
    children: Vec<Supervised>,
}

impl Supervisor {
    /// Creates a supervisor with no children.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns and registers a service child.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChildProcess`] if the child cannot be spawned.
    pub fn register(&mut self, command: Command, label: &str) -> Result<()> {
        self.spawn(command, label, false)
    }

    /// Spawns and registers the primary child. Its exit ends the run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChildProcess`] if the child cannot be spawned.
    pub fn register_primary(&mut self, command: Command, label: &str) -> Result<()> {
        self.spawn(command, label, true)
    }

    fn spawn(&mut self, mut command: Command, label: &str, primary: bool) -> Result<()> {
        let child = command.spawn().map_err(|e| Error::ChildProcess {
            name: label.to_string(),
            reason: format!("failed to spawn: {e}"),
        })?;
        debug!(child = label, pid = child.id(), primary, "registered child");
        self.children.push(Supervised {
            label: label.to_string(),
            child,
            primary,
        });
        Ok(())
    }

    /// Number of currently registered children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Blocks until the run completes and returns its exit status.
    ///
    /// The run ends when the primary exits; remaining services are torn
    /// down and reaped first, so every registered child has exited by the
    /// time this returns. Statuses fold signal deaths as `128 + signo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChildProcess`] if no children were registered or
    /// waiting fails.
    pub fn run(mut self) -> Result<i32> {
        if self.children.is_empty() {
            return Err(Error::ChildProcess {
                name: "supervisor".to_string(),
                reason: "no children registered".to_string(),
            });
        }

        loop {
            let (pid, status) = wait_any()?;

            let Some(position) = self
                .children
                .iter()
                .position(|entry| entry.child.id() == pid)
            else {
                // A grandchild reparented onto us; keep waiting.
                continue;
            };
            let exited = self.children.swap_remove(position);

            if exited.primary {
                debug!(child = %exited.label, status, "primary exited");
            } else {
                warn!(child = %exited.label, status, "service child exited before the command finished");
            }
            self.teardown();
            return Ok(status);
        }
    }

    /// SIGTERM every remaining child, wait out the grace period, SIGKILL
    /// and reap whatever is left.
    fn teardown(&mut self) {
        if self.children.is_empty() {
            return;
        }

        for entry in &self.children {
            // SAFETY: kill with a pid we spawned and have not reaped.
            let result = unsafe { libc::kill(entry.child.id() as libc::pid_t, libc::SIGTERM) };
            if result != 0 {
                debug!(child = %entry.label, "SIGTERM failed (already dead?)");
            }
        }

        thread::sleep(SHUTDOWN_GRACE);

        for entry in &mut self.children {
            // Child::kill is a no-op error on already-reaped processes.
            let _ = entry.child.kill();
            let _ = entry.child.wait();
        }
        self.children.clear();
    }
}

/// Blocks until any child exits; returns its pid and folded exit status.
fn wait_any() -> Result<(u32, i32)> {
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: waitpid(-1) waits for any child of this process.
        let pid = unsafe { libc::waitpid(-1, &mut status, 0) };

        if pid > 0 {
            return Ok((pid as u32, fold_status(status)));
        }

        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(Error::ChildProcess {
            name: "supervisor".to_string(),
            reason: format!("waitpid failed: {err}"),
        });
    }
}

/// Folds a raw wait status into an exit code.
fn fold_status(status: libc::c_int) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else if libc::WIFSIGNALED(status) {
        128 + libc::WTERMSIG(status)
    } else {
        1
    }
}
