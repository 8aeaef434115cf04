//! Error types for the replay sandbox.

use std::path::PathBuf;

/// Result type alias for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or supervising the replay sandbox.
///
/// Every variant is fatal to the run: a half-configured namespace is worse
/// than no sandbox, so nothing here is retried or recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Argument Errors
    // =========================================================================
    /// Bad or missing command-line arguments. Rendered as the usage line.
    #[error("{0}")]
    Usage(String),

    // =========================================================================
    // Corpus Errors
    // =========================================================================
    /// Unreadable or malformed record, or a directory listing failure.
    /// Always names the offending path.
    #[error("corpus error: {}: {reason}", .path.display())]
    Corpus { path: PathBuf, reason: String },

    // =========================================================================
    // Privilege Errors
    // =========================================================================
    /// Failure to lower or restore the process's effective identity.
    #[error("privilege error: {0}")]
    Privilege(String),

    // =========================================================================
    // Namespace Errors
    // =========================================================================
    /// Failure to create the network namespace, bring up loopback, or
    /// materialize a dummy interface.
    #[error("namespace setup failed: {operation}: {source}")]
    Namespace {
        operation: String,
        source: std::io::Error,
    },

    // =========================================================================
    // Resource Errors
    // =========================================================================
    /// Failure to create or populate a temporary artifact.
    #[error("failed to create {artifact}: {source}")]
    Resource {
        artifact: String,
        source: std::io::Error,
    },

    // =========================================================================
    // Child Process Errors
    // =========================================================================
    /// Failure to spawn or register a required child process.
    #[error("child process '{name}': {reason}")]
    ChildProcess { name: String, reason: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
