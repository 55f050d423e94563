//! Query engine for Divan
//!
//! This crate turns a query into a lazy document sequence:
//! - cursor: query dispatch and the unified `DocumentCursor`
//! - view_cursor / mango_cursor: the two pagination strategies
//! - reducer: single-result lookups with a one-row probe
//! - sink: advisory warnings raised while paginating
//! - store: `CouchStore`, the caller-facing facade
//! - config: `divan.toml` loading
//!
//! The engine is the only component that knows about:
//! - Page sizing and termination
//! - Store defaults and purge policy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod mango_cursor;
pub mod reducer;
pub mod sink;
pub mod store;
pub mod view_cursor;

pub use config::{PurgePolicy, StoreConfig, CONFIG_FILE_NAME};
pub use cursor::{open, DocumentCursor};
pub use mango_cursor::MangoCursor;
pub use reducer::{reduce_single, single_result_options, LOOKAHEAD};
pub use sink::{CollectingWarningSink, TracingWarningSink, WarningSink};
pub use store::CouchStore;
pub use view_cursor::ViewCursor;

pub use divan_core::{
    is_design_doc_id, Document, Error, MangoQuery, PageOptions, Query, Result, TransportError,
    ViewQuery, ViewTarget, DEFAULT_READ_SIZE, DESIGN_DOC_PREFIX,
};
pub use divan_gateway::{
    ConnectionConfig, CouchTransport, DatabaseInfo, DocumentGateway, HttpRequest, HttpTransport,
    Method,
};
