//! HTTP collaborator interface
//!
//! The gateway describes each round trip as an [`HttpRequest`] and hands it to
//! a [`CouchTransport`], which executes it and returns the parsed JSON body.
//! Connection handling, authentication and timeouts are the transport's
//! concern.

use async_trait::async_trait;
use divan_core::TransportError;
use serde_json::Value;
use std::fmt;

/// HTTP method of a CouchDB request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// PUT
    Put,
    /// POST
    Post,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical request against the server.
///
/// `path` is relative to the server root and already percent-encoded,
/// e.g. `mydb/_all_docs`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Encoded path relative to the server root
    pub path: String,
    /// JSON body for PUT and POST
    pub body: Option<Value>,
}

impl HttpRequest {
    /// GET request without body
    pub fn get(path: impl Into<String>) -> Self {
        HttpRequest {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// PUT request with a JSON body
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        HttpRequest {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    /// POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        HttpRequest {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Executes requests against a CouchDB-compatible server.
///
/// Implementations return the parsed body of a 2xx response, or
/// `TransportError::Status` carrying CouchDB's `error`/`reason` for any
/// other status. The trait is object-safe for use as
/// `Arc<dyn CouchTransport>`.
///
/// # Implementations
///
/// - `HttpTransport`: blocking `ureq` agent on tokio's blocking pool
/// - `MemoryCouch` (feature `testing`): in-memory stand-in
#[async_trait]
pub trait CouchTransport: Send + Sync {
    /// Execute one request.
    async fn execute(&self, request: HttpRequest) -> Result<Value, TransportError>;
}

// ============================================================================
// Path encoding
// ============================================================================

/// Percent-encode one path segment (RFC 3986 unreserved characters pass).
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Encode a document identifier for use in a path.
///
/// `_design/` and `_local/` prefixes keep their slash; everything else is
/// one segment.
pub fn encode_doc_id(id: &str) -> String {
    for prefix in ["_design/", "_local/"] {
        if let Some(rest) = id.strip_prefix(prefix) {
            return format!("{}{}", prefix, encode_segment(rest));
        }
    }
    encode_segment(id)
}
