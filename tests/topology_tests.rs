//! Tests for corpus scanning and the derived topology.
//!
//! Covers set deduplication, the projection invariants between the three
//! sets, scan idempotence, and the fatal handling of broken corpora.

use std::collections::BTreeSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use tempfile::TempDir;

use netreplay::error::Error;
use netreplay::Topology;

fn write_record(dir: &Path, name: &str, ip: &str, port: u16, host: &str) {
    let record = serde_json::json!({
        "ip": ip,
        "port": port,
        "request": {
            "first_line": "GET / HTTP/1.1",
            "headers": [{"name": "Host", "value": host}]
        },
        "response": {"first_line": "HTTP/1.1 200 OK"}
    });
    fs::write(dir.join(name), record.to_string()).unwrap();
}

// =============================================================================
// Scanning Tests
// =============================================================================

#[test]
fn test_single_record_topology() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), "save.0", "10.0.0.1", 80, "example.com");

    let topology = Topology::scan(dir.path()).unwrap();

    let ip: IpAddr = "10.0.0.1".parse().unwrap();
    let endpoint: SocketAddr = "10.0.0.1:80".parse().unwrap();
    assert_eq!(topology.unique_ips, BTreeSet::from([ip]));
    assert_eq!(topology.unique_endpoints, BTreeSet::from([endpoint]));
    assert_eq!(topology.unique_ports, BTreeSet::from([80]));
    assert_eq!(
        topology.hostnames,
        vec![("example.com".to_string(), endpoint)]
    );
}

#[test]
fn test_shared_ip_two_ports_deduplicates_ip_only() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), "save.0", "10.0.0.1", 80, "example.com");
    write_record(dir.path(), "save.1", "10.0.0.1", 443, "example.com");

    let topology = Topology::scan(dir.path()).unwrap();

    assert_eq!(topology.unique_ips.len(), 1);
    assert_eq!(topology.unique_endpoints.len(), 2);
    assert_eq!(topology.unique_ports.len(), 2);
    assert_eq!(topology.record_count(), 2);
}

#[test]
fn test_empty_corpus_scans_to_empty_topology() {
    let dir = TempDir::new().unwrap();

    let topology = Topology::scan(dir.path()).unwrap();

    assert!(topology.is_empty());
    assert!(topology.unique_ips.is_empty());
    assert!(topology.unique_endpoints.is_empty());
    assert!(topology.unique_ports.is_empty());
}

#[test]
fn test_every_record_contributes_one_hostname_entry() {
    let dir = TempDir::new().unwrap();
    // Same hostname recorded against two different origins: both entries
    // survive, in listing order, for last-write-wins downstream.
    write_record(dir.path(), "save.0", "10.0.0.1", 80, "example.com");
    write_record(dir.path(), "save.1", "10.0.0.2", 80, "example.com");

    let topology = Topology::scan(dir.path()).unwrap();

    assert_eq!(topology.record_count(), 2);
    let hosts: Vec<&str> = topology
        .hostnames
        .iter()
        .map(|(host, _)| host.as_str())
        .collect();
    assert_eq!(hosts, vec!["example.com", "example.com"]);
}

// =============================================================================
// Invariant Tests
// =============================================================================

#[test]
fn test_sets_are_projections_of_endpoints() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), "save.0", "10.0.0.2", 443, "a.example");
    write_record(dir.path(), "save.1", "10.0.0.1", 80, "b.example");
    write_record(dir.path(), "save.2", "10.0.0.2", 80, "c.example");
    write_record(dir.path(), "save.3", "192.168.7.9", 8080, "d.example");

    let topology = Topology::scan(dir.path()).unwrap();

    let ips: BTreeSet<IpAddr> = topology.unique_endpoints.iter().map(SocketAddr::ip).collect();
    let ports: BTreeSet<u16> = topology
        .unique_endpoints
        .iter()
        .map(SocketAddr::port)
        .collect();
    assert_eq!(ips, topology.unique_ips);
    assert_eq!(ports, topology.unique_ports);
}

#[test]
fn test_scan_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_record(dir.path(), "save.0", "10.0.0.1", 80, "a.example");
    write_record(dir.path(), "save.1", "10.0.0.2", 443, "b.example");

    let first = Topology::scan(dir.path()).unwrap();
    let second = Topology::scan(dir.path()).unwrap();

    assert_eq!(first.unique_ips, second.unique_ips);
    assert_eq!(first.unique_endpoints, second.unique_endpoints);
    assert_eq!(first.unique_ports, second.unique_ports);
    // Listing order is held fixed between the two scans, so the mapping
    // matches too.
    assert_eq!(first.hostnames, second.hostnames);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_missing_directory_is_corpus_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");

    let err = Topology::scan(&missing).unwrap_err();

    match err {
        Error::Corpus { path, .. } => assert_eq!(path, missing),
        other => panic!("expected corpus error, got {other:?}"),
    }
}

#[test]
fn test_non_record_file_aborts_scan_naming_it() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("stray.txt"), "not a record").unwrap();

    let err = Topology::scan(dir.path()).unwrap_err();

    assert!(err.to_string().contains("stray.txt"));
}

#[test]
fn test_record_without_host_header_aborts_scan() {
    let dir = TempDir::new().unwrap();
    let record = serde_json::json!({
        "ip": "10.0.0.1",
        "port": 80,
        "request": {"first_line": "GET / HTTP/1.1", "headers": []},
        "response": {"first_line": "HTTP/1.1 200 OK"}
    });
    fs::write(dir.path().join("save.0"), record.to_string()).unwrap();

    let err = Topology::scan(dir.path()).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("save.0"));
    assert!(message.contains("Host"));
}
