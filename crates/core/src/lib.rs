//! Core types for Divan
//!
//! This crate defines the foundational types used throughout the system:
//! - Document: CouchDB document with reserved `_id`/`_rev`/`_deleted` fields
//! - Query: tagged query value (by id, id list, Mango, view)
//! - PageOptions: validated read size and logical limit
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod options;
pub mod query;

pub use document::{is_design_doc_id, Document, DESIGN_DOC_PREFIX};
pub use error::{Error, Result, TransportError};
pub use options::{PageOptions, DEFAULT_READ_SIZE};
pub use query::{MangoQuery, Query, ViewQuery, ViewTarget};
