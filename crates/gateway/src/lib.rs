//! CouchDB gateway for Divan
//!
//! This crate issues the primitive operations against one database:
//! - CouchTransport: async HTTP collaborator trait
//! - HttpTransport: `ureq` implementation with basic auth and timeouts
//! - DocumentGateway: get, upsert, purge, one view page, one `_find` page
//! - wire: request and response bodies
//! - MemoryCouch (feature `testing`): in-memory stand-in for tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod gateway;
pub mod http;
pub mod transport;
pub mod wire;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use gateway::DocumentGateway;
pub use http::{ConnectionConfig, HttpTransport, DEFAULT_TIMEOUT_MS, DEFAULT_URL};
pub use transport::{encode_doc_id, encode_segment, CouchTransport, HttpRequest, Method};
pub use wire::{
    DatabaseInfo, MangoPage, MangoPageRequest, PurgeResponse, ViewPage, ViewPageRequest, ViewRow,
    WriteResponse,
};

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryCouch;
