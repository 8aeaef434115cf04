//! DNS override for the replay namespace.
//!
//! Inside the sandbox, recorded hostnames must resolve to replay addresses
//! instead of real DNS results. The mapping is rendered as a two-column
//! `IP hostname` file (one line per scanned record, in directory order)
//! and handed to a foreground dnsmasq that reads nothing else: no upstream
//! resolvers, no `/etc/hosts`, so only recorded names resolve.
//!
//! The host's configured resolver addresses are read here too; the
//! orchestrator binds a dummy interface to each so resolver queries have a
//! route inside the namespace.

use std::fs;
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::process::Command;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::constants::{DNSMASQ_BIN, RESOLV_CONF_PATH, SINGLE_SERVER_LISTEN_IP};
use crate::error::{Error, Result};
use crate::topology::{Topology, TopologyMode};

// =============================================================================
// Resolver Configuration
// =============================================================================

/// Reads the host resolver addresses the namespace must keep routable.
///
/// # Errors
///
/// Returns [`Error::Resource`] if the resolver configuration cannot be read.
pub fn nameservers() -> Result<Vec<IpAddr>> {
    let text = fs::read_to_string(RESOLV_CONF_PATH).map_err(|e| Error::Resource {
        artifact: RESOLV_CONF_PATH.to_string(),
        source: e,
    })?;
    Ok(parse_resolv_conf(&text))
}

/// Extracts `nameserver` entries from resolv.conf text.
///
/// Entries that do not parse as bare addresses (scoped IPv6 forms like
/// `fe80::1%eth0`) are skipped; this crate cannot route them anyway.
#[must_use]
pub fn parse_resolv_conf(text: &str) -> Vec<IpAddr> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            if fields.next()? != "nameserver" {
                return None;
            }
            fields.next()?.parse().ok()
        })
        .collect()
}

// =============================================================================
// Override File
// =============================================================================

/// Hostname→IP override mapping handed to the DNS override process.
///
/// Owns the backing temp file for the whole supervised run; dropping the
/// handle removes the file.
pub struct DnsOverride {
    hosts_file: NamedTempFile,
}

impl DnsOverride {
    /// Renders and writes the override mapping for `topology` under `mode`.
    ///
    /// An empty corpus still produces the (empty) file: dnsmasq starts
    /// either way and resolves nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resource`] if the file cannot be created or written.
    pub fn write(mode: TopologyMode, topology: &Topology) -> Result<Self> {
        let resource = |e: std::io::Error| Error::Resource {
            artifact: "DNS override file".to_string(),
            source: e,
        };

        let mut hosts_file = NamedTempFile::with_prefix("netreplay-hosts-").map_err(resource)?;
        let rendered = render_hosts(mode, &topology.hostnames);
        hosts_file.write_all(rendered.as_bytes()).map_err(resource)?;
        hosts_file.flush().map_err(resource)?;

        debug!(
            path = %hosts_file.path().display(),
            entries = topology.hostnames.len(),
            "wrote DNS override file"
        );
        Ok(Self { hosts_file })
    }

    /// Path of the mapping file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.hosts_file.path()
    }

    /// The DNS override process invocation: foreground dnsmasq reading
    /// mappings only from the generated file.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(DNSMASQ_BIN);
        cmd.args(["--keep-in-foreground", "--no-resolv", "--no-hosts"])
            .arg("-H")
            .arg(self.hosts_file.path())
            .env_clear();
        cmd
    }
}

/// Renders the two-column (IP, hostname) mapping.
///
/// Single mode rewrites every line's IP column to the placeholder listen
/// address; sharded mode keeps each entry's recorded origin IP. A hostname
/// recorded with two origins yields two lines; the later one wins
/// downstream, which is carried over from observed behavior.
#[must_use]
pub fn render_hosts(mode: TopologyMode, mappings: &[(String, SocketAddr)]) -> String {
    let mut out = String::new();
    for (hostname, origin) in mappings {
        let ip = match mode {
            TopologyMode::Single => SINGLE_SERVER_LISTEN_IP,
            TopologyMode::Sharded => origin.ip(),
        };
        out.push_str(&format!("{ip} {hostname}\n"));
    }
    out
}

// =============================================================================
// Tests
// =============================================================================
