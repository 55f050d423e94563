//! Error types for Divan
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! | Category | Variants | Raised |
//! |----------|----------|--------|
//! | Validation | `InvalidOptions`, `InvalidQuery` | before any network call |
//! | Invariant | `MultipleResults` | single-result lookup saw a second match |
//! | Capability | `PurgeUnsupported` | purge with a disabled policy |
//! | Transport | `Transport` | HTTP collaborator failed, propagated unchanged |
//! | Decoding | `Decode` | a 2xx response did not have the expected shape |
//! | Config | `Config` | configuration file unreadable or invalid |

use thiserror::Error;

/// Result type alias for Divan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the HTTP collaborator.
///
/// A 404 on a direct document read is recovered by the gateway and never
/// surfaces as a `TransportError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("HTTP {status}: {error} ({reason})")]
    Status {
        /// HTTP status code
        status: u16,
        /// CouchDB `error` field, or the status text
        error: String,
        /// CouchDB `reason` field
        reason: String,
    },

    /// Request could not be delivered (connection refused, DNS, timeout, ...)
    #[error("network error: {0}")]
    Network(String),

    /// Response body was not valid JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl TransportError {
    /// HTTP status code, if the failure came from the server
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a 404 response
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for a 409 response (stale or missing revision on write)
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// Error types for Divan
#[derive(Debug, Error)]
pub enum Error {
    /// Pagination options out of bounds (`readSize`, `limit`)
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Query value could not be classified into exactly one strategy
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A single-result lookup matched more than one document
    #[error("expected at most one document, query matched more (first: {first_id})")]
    MultipleResults {
        /// Identifier of the first matching document
        first_id: String,
    },

    /// Purge requested on a store configured without purge support
    #[error("purge is not supported by this store")]
    PurgeUnsupported,

    /// HTTP collaborator failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response decoded as JSON but not into the expected shape
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration could not be read or is invalid
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True if this error came from an HTTP 409 conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Transport(e) if e.is_conflict())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
