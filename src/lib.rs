//! Divan - query dispatch and cursor pagination over CouchDB
//!
//! Divan reads a CouchDB database through one of four query shapes (id, id
//! list, Mango selector, view range) and always hands back the same lazy
//! document cursor, paging through the HTTP API as documents are consumed.
//!
//! # Quick Start
//!
//! ```ignore
//! use divan::{CouchStore, Document, MangoQuery, PageOptions, StoreConfig};
//! use serde_json::json;
//!
//! let store = CouchStore::connect(&StoreConfig::from_file("divan.toml".as_ref())?)?;
//!
//! // Write a document
//! let ada = store.write(Document::new().field("name", "Ada")).await?;
//!
//! // Stream every match, 20 per request
//! let mut cursor = store.filter(
//!     MangoQuery::new(json!({"name": "Ada"})),
//!     Some(PageOptions::default().with_read_size(20)?),
//! )?;
//! while let Some(doc) = cursor.next().await? {
//!     println!("{}", doc.id);
//! }
//! ```
//!
//! # Architecture
//!
//! All reads go through [`CouchStore`], which dispatches each [`Query`] to a
//! view or Mango cursor. HTTP plumbing lives behind [`CouchTransport`].

// Re-export the public API from divan-engine
pub use divan_engine::*;
