//! Tests for replay server fleet construction.
//!
//! Validates fleet sizing per mode, the generated configuration artifacts,
//! and artifact cleanup on drop.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use netreplay::constants::SINGLE_SERVER_LISTEN_IP;
use netreplay::server::build_fleet;
use netreplay::{ReplayServer, Topology, TopologyMode};

fn scenario_c_topology() -> Topology {
    // Two records sharing an IP but split across ports.
    let mut topology = Topology::new();
    topology.insert("example.com".to_string(), "10.0.0.1:80".parse().unwrap());
    topology.insert("example.com".to_string(), "10.0.0.1:443".parse().unwrap());
    topology
}

// =============================================================================
// Fleet Sizing Tests
// =============================================================================

#[test]
fn test_sharded_fleet_one_handle_per_endpoint() {
    let workdir = TempDir::new().unwrap();
    let topology = scenario_c_topology();

    let fleet = build_fleet(
        TopologyMode::Sharded,
        &topology,
        Path::new("corpus/"),
        workdir.path(),
    )
    .unwrap();

    assert_eq!(fleet.len(), 2);
    assert_eq!(
        fleet[0].listen_addrs(),
        &["10.0.0.1:80".parse::<SocketAddr>().unwrap()]
    );
    assert_eq!(
        fleet[1].listen_addrs(),
        &["10.0.0.1:443".parse::<SocketAddr>().unwrap()]
    );
}

#[test]
fn test_single_fleet_is_one_handle_covering_all_ports() {
    let workdir = TempDir::new().unwrap();
    let topology = scenario_c_topology();

    let fleet = build_fleet(
        TopologyMode::Single,
        &topology,
        Path::new("corpus/"),
        workdir.path(),
    )
    .unwrap();

    assert_eq!(fleet.len(), 1);
    assert_eq!(
        fleet[0].listen_addrs(),
        &[
            format!("{SINGLE_SERVER_LISTEN_IP}:80").parse::<SocketAddr>().unwrap(),
            format!("{SINGLE_SERVER_LISTEN_IP}:443").parse::<SocketAddr>().unwrap(),
        ]
    );
}

#[test]
fn test_empty_sharded_fleet_is_empty() {
    let workdir = TempDir::new().unwrap();
    let topology = Topology::new();

    let fleet = build_fleet(
        TopologyMode::Sharded,
        &topology,
        Path::new("corpus/"),
        workdir.path(),
    )
    .unwrap();

    assert!(fleet.is_empty());
}

// =============================================================================
// Configuration Artifact Tests
// =============================================================================

#[test]
fn test_config_artifact_contents() {
    let workdir = TempDir::new().unwrap();
    let server = ReplayServer::shard(
        "10.0.0.1:80".parse().unwrap(),
        Path::new("corpus/"),
        workdir.path(),
    )
    .unwrap();

    let config: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(server.config_path()).unwrap()).unwrap();

    assert_eq!(config["listen"][0], "10.0.0.1:80");
    assert_eq!(config["corpus_dir"], "corpus/");
    assert_eq!(
        config["working_dir"],
        workdir.path().to_string_lossy().into_owned()
    );
}

#[test]
fn test_config_artifact_removed_on_drop() {
    let workdir = TempDir::new().unwrap();

    let path: PathBuf;
    {
        let server = ReplayServer::shard(
            "10.0.0.1:80".parse().unwrap(),
            Path::new("corpus/"),
            workdir.path(),
        )
        .unwrap();
        path = server.config_path();
        assert!(path.exists());
    }

    assert!(!path.exists(), "config artifact is scoped to the handle");
}

#[test]
fn test_handles_own_disjoint_artifacts() {
    let workdir = TempDir::new().unwrap();
    let topology = scenario_c_topology();

    let fleet = build_fleet(
        TopologyMode::Sharded,
        &topology,
        Path::new("corpus/"),
        workdir.path(),
    )
    .unwrap();

    assert_ne!(fleet[0].config_path(), fleet[1].config_path());
}

// =============================================================================
// Process Invocation Tests
// =============================================================================

#[test]
fn test_server_invocation_points_at_config() {
    let workdir = TempDir::new().unwrap();
    let server = ReplayServer::shard(
        "10.0.0.1:80".parse().unwrap(),
        Path::new("corpus/"),
        workdir.path(),
    )
    .unwrap();

    let command = server.command();

    assert_eq!(command.get_program(), "netreplay-server");
    let args: Vec<String> = command
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        args,
        vec![
            "--config".to_string(),
            server.config_path().to_string_lossy().into_owned()
        ]
    );
    assert_eq!(command.get_envs().count(), 0);
}
