//! Replay topology derived from a record corpus.
//!
//! Scanning a corpus produces the minimal set of network identities that
//! must exist inside the namespace: the unique origin IPs (one dummy
//! interface each in sharded mode), the unique (IP, port) endpoints (one
//! replay server each in sharded mode), the unique ports (the listen set of
//! the one server in single-server mode), and the ordered hostname mapping
//! the DNS override file is rendered from.

use std::collections::BTreeSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use crate::error::{Error, Result};
use crate::record::Exchange;

/// Serving strategy for the replay fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyMode {
    /// One listening address; every hostname resolves to it, origins are
    /// disambiguated only by port and DNS override.
    Single,
    /// One listening address per recorded origin; each hostname resolves to
    /// its own recorded IP.
    Sharded,
}

/// Deduplicated network identities needed inside the namespace.
///
/// The sets are ordered by the natural total order over addresses and
/// ports, which is also the iteration order used for interface naming, so
/// the same corpus always materializes the same topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    /// Unique origin IPs.
    pub unique_ips: BTreeSet<IpAddr>,
    /// Unique origin (IP, port) endpoints.
    pub unique_endpoints: BTreeSet<SocketAddr>,
    /// Unique origin ports.
    pub unique_ports: BTreeSet<u16>,
    /// One (hostname, origin) entry per record, in directory listing order.
    /// Duplicate hostnames are preserved, not collapsed.
    pub hostnames: Vec<(String, SocketAddr)>,
}

impl Topology {
    /// Creates an empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans every record file in `directory` and accumulates its
    /// identities. The corpus is untrusted; callers lower privilege around
    /// this call.
    ///
    /// Directory listing order is filesystem-defined. It only decides which
    /// entry of a duplicated hostname wins in the override file, never the
    /// contents of the deduplicated sets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corpus`] naming the offending path if the directory
    /// cannot be listed or any entry fails to decode as a record. The whole
    /// run aborts; there is no skip-and-continue.
    pub fn scan(directory: &Path) -> Result<Self> {
        let entries = fs::read_dir(directory).map_err(|e| Error::Corpus {
            path: directory.to_path_buf(),
            reason: format!("cannot list directory: {e}"),
        })?;

        let mut topology = Self::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Corpus {
                path: directory.to_path_buf(),
                reason: format!("cannot read directory entry: {e}"),
            })?;
            let path = entry.path();

            let exchange = Exchange::from_file(&path)?;
            let host = exchange.host().ok_or_else(|| Error::Corpus {
                path: path.clone(),
                reason: "stored request has no Host header".to_string(),
            })?;
            topology.insert(host.to_string(), exchange.origin());
        }
        Ok(topology)
    }

    /// Records one exchange's identities. Every record contributes exactly
    /// one hostname entry; the sets deduplicate.
    pub fn insert(&mut self, hostname: String, origin: SocketAddr) {
        self.unique_ips.insert(origin.ip());
        self.unique_endpoints.insert(origin);
        self.unique_ports.insert(origin.port());
        self.hostnames.push((hostname, origin));
    }

    /// Number of records scanned.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.hostnames.len()
    }

    /// True when the corpus held no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hostnames.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
