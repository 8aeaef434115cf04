//! # Replay Sandbox Constants
//!
//! Single source of truth for the topology placeholders, interface naming,
//! external process names, and resource bounds used throughout the crate.
//!
//! ## Cross-References
//!
//! - [`crate::netns`]: interface names and the `ip(8)` tool
//! - [`crate::dns`]: resolver configuration and the DNS override process
//! - [`crate::server`]: the replay server process
//! - [`crate::record`]: record decoding bounds

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

// =============================================================================
// Topology
// =============================================================================

/// Listen address shared by every origin in single-server mode.
///
/// An arbitrary public address; it only has to be routable inside the
/// namespace (a dummy interface is bound to it) and must not collide with
/// loopback or the resolver addresses.
pub const SINGLE_SERVER_LISTEN_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(23, 253, 180, 102));

/// Interface bound to [`SINGLE_SERVER_LISTEN_IP`] in single-server mode.
pub const SINGLE_SERVER_INTERFACE: &str = "external";

/// Name prefix for per-origin interfaces in sharded mode. Interfaces are
/// numbered in address order so the same corpus always yields the same names.
pub const SHARDED_INTERFACE_PREFIX: &str = "sharded";

/// Name prefix for resolver-facing interfaces, one per configured
/// nameserver, created in every mode.
pub const NAMESERVER_INTERFACE_PREFIX: &str = "nameserver";

// =============================================================================
// External Processes
// =============================================================================

/// Tool used to materialize interfaces inside the namespace.
pub const IP_BIN: &str = "ip";

/// DNS override process; consumes the generated hostname mapping file.
pub const DNSMASQ_BIN: &str = "dnsmasq";

/// Replay web server; one process per fleet handle, consumes a generated
/// configuration file.
pub const REPLAY_SERVER_BIN: &str = "netreplay-server";

/// Host resolver configuration read for resolver-facing interfaces.
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Fallback when the invoking user has no `SHELL` in the captured
/// environment.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Prompt prefix folded into `PS1` for the supervised command.
pub const SHELL_PREFIX: &str = "[replay] ";

// =============================================================================
// Limits
// =============================================================================

/// Maximum size of a single record file (16 MiB).
///
/// The corpus is untrusted input; this bounds memory spent decoding one
/// record. Recorded exchanges are typically a few hundred KiB.
pub const MAX_RECORD_SIZE: u64 = 16 * 1024 * 1024;

/// Grace period between SIGTERM and SIGKILL when tearing down service
/// children after the supervised command exits.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit code for any failure before supervision begins.
pub const EXIT_SETUP_FAILURE: u8 = 1;
