//! Stored HTTP exchange format.
//!
//! A record corpus is a directory with one JSON file per recorded exchange:
//! the request and response as captured, plus the origin address the request
//! was originally sent to. Orchestration consumes only the origin address
//! and the request's `Host` header; the rest of the record is matched
//! against live requests by the replay server process.
//!
//! Records are untrusted user input. A file that cannot be opened or
//! decoded fails the whole run; a partially reconstructed topology would
//! replay a different network than the one recorded.

use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_RECORD_SIZE;
use crate::error::{Error, Result};

// =============================================================================
// Stored Message Halves
// =============================================================================

/// One header line as captured on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name as sent (original casing preserved).
    pub name: String,
    /// Header value with leading/trailing whitespace stripped.
    pub value: String,
}

/// Serialized request half of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRequest {
    /// Request line, e.g. `GET /index.html HTTP/1.1`.
    pub first_line: String,
    /// Captured headers in wire order.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Request body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl StoredRequest {
    /// Looks up a header value by name. Header names compare
    /// case-insensitively per HTTP semantics.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

/// Serialized response half of an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Status line, e.g. `HTTP/1.1 200 OK`.
    pub first_line: String,
    /// Captured headers in wire order.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Response body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

// =============================================================================
// Exchange
// =============================================================================

/// One recorded request/response exchange plus its original destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// IP address the request was originally sent to.
    pub ip: IpAddr,
    /// Port the request was originally sent to.
    pub port: u16,
    /// The request as captured.
    pub request: StoredRequest,
    /// The response as captured.
    pub response: StoredResponse,
}

impl Exchange {
    /// The origin address as one value.
    #[must_use]
    pub fn origin(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// The `Host` header of the embedded request, if the record carries one.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.request.header_value("Host")
    }

    /// Decodes one record file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corpus`] naming `path` if the file cannot be opened,
    /// exceeds [`MAX_RECORD_SIZE`], or does not decode as a stored exchange.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::Corpus {
            path: path.to_path_buf(),
            reason: format!("cannot open: {e}"),
        })?;

        let size = file
            .metadata()
            .map_err(|e| Error::Corpus {
                path: path.to_path_buf(),
                reason: format!("cannot stat: {e}"),
            })?
            .len();
        if size > MAX_RECORD_SIZE {
            return Err(Error::Corpus {
                path: path.to_path_buf(),
                reason: format!("record exceeds {MAX_RECORD_SIZE} bytes ({size})"),
            });
        }

        serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Corpus {
            path: path.to_path_buf(),
            reason: format!("invalid request/response record: {e}"),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
