//! Replay server fleet construction.
//!
//! Each replay server is an external process that matches incoming requests
//! against the record corpus; this module only decides how many servers
//! exist, what each listens on, and generates the private configuration
//! artifact each one consumes.
//!
//! In sharded mode there is one server per unique recorded (IP, port)
//! endpoint. In single-server mode there is exactly one, bound to the
//! placeholder address and accepting connections on every recorded port.
//!
//! A handle owns its configuration file for its whole lifetime and removes
//! it on drop, and only its own, so handle teardown never races. Handles own
//! file and (eventual) process resources, so they move rather than copy.

use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::constants::{REPLAY_SERVER_BIN, SINGLE_SERVER_LISTEN_IP};
use crate::error::{Error, Result};
use crate::topology::{Topology, TopologyMode};

// =============================================================================
// Configuration Artifact
// =============================================================================

/// Configuration consumed by one replay server process.
#[derive(Debug, Serialize)]
struct ServerConfig<'a> {
    /// Addresses the server accepts connections on.
    listen: &'a [SocketAddr],
    /// Directory holding the recorded exchanges to match against.
    corpus_dir: &'a Path,
    /// Directory the server resolves relative paths from.
    working_dir: &'a Path,
}

// =============================================================================
// Server Handle
// =============================================================================

/// One replay server and its private configuration artifact.
pub struct ReplayServer {
    config_file: NamedTempFile,
    listen: Vec<SocketAddr>,
}

impl ReplayServer {
    /// Sharded-mode server bound to exactly one recorded origin endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resource`] if the configuration artifact cannot be
    /// created.
    pub fn shard(endpoint: SocketAddr, corpus_dir: &Path, working_dir: &Path) -> Result<Self> {
        Self::new(vec![endpoint], corpus_dir, working_dir)
    }

    /// Single-server-mode server covering every recorded port on the
    /// placeholder listen address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resource`] if the configuration artifact cannot be
    /// created.
    pub fn single(
        ports: impl IntoIterator<Item = u16>,
        corpus_dir: &Path,
        working_dir: &Path,
    ) -> Result<Self> {
        let listen = ports
            .into_iter()
            .map(|port| SocketAddr::new(SINGLE_SERVER_LISTEN_IP, port))
            .collect();
        Self::new(listen, corpus_dir, working_dir)
    }

    fn new(listen: Vec<SocketAddr>, corpus_dir: &Path, working_dir: &Path) -> Result<Self> {
        let resource = |e: std::io::Error| Error::Resource {
            artifact: "replay server configuration".to_string(),
            source: e,
        };

        let mut config_file =
            NamedTempFile::with_prefix("netreplay-server-").map_err(resource)?;
        let config = ServerConfig {
            listen: &listen,
            corpus_dir,
            working_dir,
        };
        let rendered =
            serde_json::to_vec_pretty(&config).map_err(|e| resource(std::io::Error::from(e)))?;
        config_file.write_all(&rendered).map_err(resource)?;
        config_file.flush().map_err(resource)?;

        debug!(
            config = %config_file.path().display(),
            listen = ?listen,
            "prepared replay server"
        );
        Ok(Self {
            config_file,
            listen,
        })
    }

    /// Addresses this server listens on.
    #[must_use]
    pub fn listen_addrs(&self) -> &[SocketAddr] {
        &self.listen
    }

    /// Path of the private configuration artifact.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_file.path().to_path_buf()
    }

    /// The replay server process invocation.
    #[must_use]
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(REPLAY_SERVER_BIN);
        cmd.arg("--config").arg(self.config_file.path()).env_clear();
        cmd
    }
}

// =============================================================================
// Fleet
// =============================================================================

/// Builds the fleet for the chosen mode: one handle per unique origin
/// endpoint when sharded, exactly one handle otherwise.
///
/// # Errors
///
/// Fails on the first handle whose configuration artifact cannot be
/// created; already-built handles clean up on drop.
pub fn build_fleet(
    mode: TopologyMode,
    topology: &Topology,
    corpus_dir: &Path,
    working_dir: &Path,
) -> Result<Vec<ReplayServer>> {
    match mode {
        TopologyMode::Sharded => topology
            .unique_endpoints
            .iter()
            .map(|endpoint| ReplayServer::shard(*endpoint, corpus_dir, working_dir))
            .collect(),
        TopologyMode::Single => Ok(vec![ReplayServer::single(
            topology.unique_ports.iter().copied(),
            corpus_dir,
            working_dir,
        )?]),
    }
}
