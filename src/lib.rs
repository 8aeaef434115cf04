//! # netreplay
//!
//! **Sandboxed replay of recorded HTTP sessions**
//!
//! Given a directory of recorded request/response exchanges, this crate
//! rebuilds the network those exchanges were captured on inside a fresh
//! network namespace and supervises an arbitrary command there. DNS
//! resolves the recorded hostnames, every recorded origin appears
//! reachable, and all traffic is silently served from local replay servers
//! instead of the real Internet.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  netreplay (root, fresh network namespace)                       │
//! │                                                                  │
//! │  corpus scan (privilege lowered)                                 │
//! │      │                                                           │
//! │      ▼                                                           │
//! │  Topology ─── unique IPs ──► dummy interfaces (sharded0, …)      │
//! │      │                       or one `external` placeholder       │
//! │      ├── unique (IP,port) ─► replay server fleet                 │
//! │      └── hostname mapping ─► DNS override file ─► dnsmasq        │
//! │                                                                  │
//! │  Supervisor ─► dnsmasq + replay servers + user command           │
//! │                (primary's exit status = run's exit status)       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Serving Strategies
//!
//! | Mode    | Interfaces          | Servers              | DNS column     |
//! |---------|---------------------|----------------------|----------------|
//! | Sharded | one per unique IP   | one per (IP, port)   | recorded IP    |
//! | Single  | one placeholder     | one, all ports       | placeholder IP |
//!
//! # Privilege Model
//!
//! Namespace and interface setup needs root; the record corpus is untrusted
//! user input. The orchestrator lowers its effective identity to the
//! invoking user for exactly the corpus scan ([`privilege::PrivilegeGuard`])
//! and drops privilege permanently before executing the user's command.
//!
//! # Lifetime Model
//!
//! Everything is process-scoped and single-shot: temp artifacts (DNS
//! override file, per-server configs) are single-owner handles that live
//! for the whole supervised run and are removed on drop; interfaces die
//! with the namespace at process exit. Nothing persists between runs.

pub mod constants;
pub mod dns;
pub mod error;
pub mod netns;
pub mod privilege;
pub mod record;
pub mod server;
pub mod supervisor;
pub mod topology;

// Re-exports
pub use dns::DnsOverride;
pub use error::{Error, Result};
pub use privilege::PrivilegeGuard;
pub use record::{Exchange, StoredRequest, StoredResponse};
pub use server::{build_fleet, ReplayServer};
pub use supervisor::Supervisor;
pub use topology::{Topology, TopologyMode};
