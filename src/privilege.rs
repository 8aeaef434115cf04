//! Scoped privilege separation.
//!
//! The record corpus is untrusted user input and must never be read with
//! the elevated identity that configures kernel namespace state. The
//! orchestrator lowers its effective identity to the invoking user for
//! exactly the corpus-scan phase, then restores it, and finally drops
//! privilege permanently before executing the user's command.
//!
//! An inconsistent privilege state is never survivable: failure to lower is
//! a fatal error, and failure to restore aborts the process outright.

use std::io;

use crate::error::{Error, Result};

/// True when the process's effective user is root.
#[must_use]
pub fn is_root() -> bool {
    // SAFETY: geteuid always succeeds.
    unsafe { libc::geteuid() == 0 }
}

/// Refuses to run without the elevated identity namespace setup needs.
///
/// # Errors
///
/// Returns [`Error::Privilege`] when the effective uid is not 0.
pub fn assert_root(program: &str) -> Result<()> {
    if !is_root() {
        return Err(Error::Privilege(format!(
            "{program} must run with effective uid 0 (setuid root, or via sudo)"
        )));
    }
    Ok(())
}

/// Scoped drop of the effective identity to the invoking (real) user.
///
/// Constructing the guard lowers privilege; dropping it restores the
/// identity captured at construction, on every exit path. Restoration
/// failure aborts the process.
#[derive(Debug)]
pub struct PrivilegeGuard {
    saved_euid: libc::uid_t,
    saved_egid: libc::gid_t,
}

impl PrivilegeGuard {
    /// Lowers the effective identity to the real user and group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Privilege`] if either id cannot be changed. The
    /// effective identity is left exactly as it was on error.
    pub fn lower() -> Result<Self> {
        // SAFETY: the get*id calls always succeed.
        let saved_euid = unsafe { libc::geteuid() };
        let saved_egid = unsafe { libc::getegid() };
        let real_uid = unsafe { libc::getuid() };
        let real_gid = unsafe { libc::getgid() };

        // Group first: once the effective uid is unprivileged the process
        // may no longer change its group.
        // SAFETY: setegid/seteuid to ids this process already holds.
        if unsafe { libc::setegid(real_gid) } != 0 {
            return Err(Error::Privilege(format!(
                "setegid({real_gid}): {}",
                io::Error::last_os_error()
            )));
        }
        if unsafe { libc::seteuid(real_uid) } != 0 {
            let err = io::Error::last_os_error();
            // Effective uid is still privileged here, so the group change
            // can be undone before reporting.
            // SAFETY: restores the egid captured above.
            if unsafe { libc::setegid(saved_egid) } != 0 {
                abort_restore_failed();
            }
            return Err(Error::Privilege(format!("seteuid({real_uid}): {err}")));
        }

        Ok(Self {
            saved_euid,
            saved_egid,
        })
    }

    /// The effective uid held before the guard lowered it.
    #[must_use]
    pub fn saved_euid(&self) -> libc::uid_t {
        self.saved_euid
    }
}

impl Drop for PrivilegeGuard {
    fn drop(&mut self) {
        // Uid first: regaining the saved (privileged) uid is what permits
        // restoring the group.
        // SAFETY: restores the ids captured at construction; the saved euid
        // remains this process's saved set-user-id.
        let uid_ok = unsafe { libc::seteuid(self.saved_euid) } == 0;
        let gid_ok = uid_ok && unsafe { libc::setegid(self.saved_egid) } == 0;
        if !uid_ok || !gid_ok {
            abort_restore_failed();
        }
    }
}

/// Permanently drops to the invoking user and group. There is no way back;
/// used in the supervised command's pre-exec hook.
///
/// # Errors
///
/// Returns the OS error if either id cannot be set. Only
/// async-signal-safe calls are made, so this is safe between fork and exec.
pub fn drop_permanently() -> io::Result<()> {
    // SAFETY: the get*id calls always succeed; setres[ug]id to the real
    // ids this process already holds.
    unsafe {
        let real_uid = libc::getuid();
        let real_gid = libc::getgid();
        if libc::setresgid(real_gid, real_gid, real_gid) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::setresuid(real_uid, real_uid, real_uid) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn abort_restore_failed() -> ! {
    // Not recoverable: later phases would run with a half-restored
    // identity. Write directly to stderr and abort.
    eprintln!("netreplay: fatal: failed to restore process privileges");
    std::process::abort();
}

// =============================================================================
// Tests
// =============================================================================
