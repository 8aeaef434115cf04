//! Network namespace and virtual interface setup.
//!
//! The sandbox is one fresh network namespace with no external
//! connectivity. Inside it, every address that must appear reachable is
//! bound to a dummy interface: the recorded origin IPs (or the single
//! placeholder address), plus one interface per configured resolver address
//! so DNS queries have a local route.
//!
//! Planning and execution are split: the plan functions are pure and decide
//! names and addresses; the create functions materialize a plan through
//! `ip(8)`. All of this requires elevated privilege and must happen before
//! any child process is spawned: children inherit the namespace at fork
//! time.

use std::io;
use std::net::IpAddr;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::constants::{
    IP_BIN, NAMESERVER_INTERFACE_PREFIX, SHARDED_INTERFACE_PREFIX, SINGLE_SERVER_INTERFACE,
    SINGLE_SERVER_LISTEN_IP,
};
use crate::error::{Error, Result};
use crate::topology::{Topology, TopologyMode};

// =============================================================================
// Namespace Operations
// =============================================================================

/// Detaches the calling process into a new, empty network namespace.
///
/// Children forked afterwards inherit it, so this must precede every spawn.
///
/// # Errors
///
/// Returns [`Error::Namespace`] with the OS error if the kernel refuses.
pub fn enter_network_namespace() -> Result<()> {
    // SAFETY: unshare(CLONE_NEWNET) only changes this process's namespace
    // membership.
    if unsafe { libc::unshare(libc::CLONE_NEWNET) } != 0 {
        return Err(Error::Namespace {
            operation: "unshare(CLONE_NEWNET)".to_string(),
            source: io::Error::last_os_error(),
        });
    }
    debug!("entered fresh network namespace");
    Ok(())
}

/// Activates the loopback interface inside the namespace.
///
/// # Errors
///
/// Returns [`Error::Namespace`] if `ip(8)` fails.
pub fn bring_up_loopback() -> Result<()> {
    run_ip(&["link", "set", "lo", "up"])
}

/// Creates a dummy interface, activates it, and assigns `address`.
///
/// Interfaces are never destroyed explicitly; the namespace tears them down
/// at process exit.
///
/// # Errors
///
/// Returns [`Error::Namespace`] if any `ip(8)` step fails.
pub fn create_dummy_interface(name: &str, address: IpAddr) -> Result<()> {
    run_ip(&["link", "add", name, "type", "dummy"])?;
    run_ip(&["link", "set", name, "up"])?;
    run_ip(&["addr", "add", &format!("{address}/32"), "dev", name])?;
    debug!(interface = name, address = %address, "created dummy interface");
    Ok(())
}

/// Materializes every (name, address) pair of a plan.
///
/// # Errors
///
/// Fails fast on the first interface the kernel refuses.
pub fn create_interfaces(plan: &[(String, IpAddr)]) -> Result<()> {
    for (name, address) in plan {
        create_dummy_interface(name, *address)?;
    }
    Ok(())
}

// =============================================================================
// Interface Planning
// =============================================================================

/// Origin-facing interfaces for the chosen mode.
///
/// Single mode binds one fixed interface to the placeholder listen address,
/// independent of corpus size. Sharded mode numbers one interface per
/// unique origin IP in address order, so the same corpus always yields the
/// same names.
#[must_use]
pub fn origin_interface_plan(mode: TopologyMode, topology: &Topology) -> Vec<(String, IpAddr)> {
    match mode {
        TopologyMode::Single => vec![(
            SINGLE_SERVER_INTERFACE.to_string(),
            SINGLE_SERVER_LISTEN_IP,
        )],
        TopologyMode::Sharded => topology
            .unique_ips
            .iter()
            .enumerate()
            .map(|(counter, ip)| (format!("{SHARDED_INTERFACE_PREFIX}{counter}"), *ip))
            .collect(),
    }
}

/// Resolver-facing interfaces, one per configured nameserver address,
/// created in every mode.
#[must_use]
pub fn nameserver_interface_plan(nameservers: &[IpAddr]) -> Vec<(String, IpAddr)> {
    nameservers
        .iter()
        .enumerate()
        .map(|(counter, ip)| (format!("{NAMESERVER_INTERFACE_PREFIX}{counter}"), *ip))
        .collect()
}

// =============================================================================
// Helpers
// =============================================================================

/// Runs one `ip(8)` invocation with a cleared environment.
fn run_ip(args: &[&str]) -> Result<()> {
    let operation = || format!("{IP_BIN} {}", args.join(" "));

    let status = Command::new(IP_BIN)
        .args(args)
        .env_clear()
        .stdin(Stdio::null())
        .status()
        .map_err(|e| Error::Namespace {
            operation: operation(),
            source: e,
        })?;

    if !status.success() {
        return Err(Error::Namespace {
            operation: operation(),
            source: io::Error::other(format!("exited with {status}")),
        });
    }
    Ok(())
}
