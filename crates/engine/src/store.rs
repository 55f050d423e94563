//! Document store facade
//!
//! `CouchStore` is the caller-facing entry point. It owns the gateway, the
//! warning sink and the store defaults, and turns every read into a
//! dispatch through [`open`].
//!
//! # Example
//!
//! ```ignore
//! use divan::{CouchStore, MangoQuery, StoreConfig};
//! use serde_json::json;
//!
//! let store = CouchStore::connect(&StoreConfig::new("app"))?;
//! let user = store
//!     .find(MangoQuery::new(json!({"email": "ada@example.com"})), None)
//!     .await?;
//! ```

use crate::config::{PurgePolicy, StoreConfig};
use crate::cursor::{open, DocumentCursor};
use crate::reducer::{reduce_single, single_result_options};
use crate::sink::{TracingWarningSink, WarningSink};
use divan_core::{Document, Error, PageOptions, Query, Result};
use divan_gateway::{CouchTransport, DatabaseInfo, DocumentGateway, HttpTransport};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Query and persistence facade over one CouchDB database.
///
/// Cloning is cheap and clones share the transport and sink.
#[derive(Clone)]
pub struct CouchStore {
    gateway: DocumentGateway,
    sink: Arc<dyn WarningSink>,
    purge: PurgePolicy,
    defaults: PageOptions,
}

impl fmt::Debug for CouchStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchStore")
            .field("gateway", &self.gateway)
            .field("purge", &self.purge)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl CouchStore {
    /// Store over `database` using `transport` for every request.
    pub fn new(database: impl Into<String>, transport: Arc<dyn CouchTransport>) -> Self {
        CouchStore {
            gateway: DocumentGateway::new(database, transport),
            sink: Arc::new(TracingWarningSink),
            purge: PurgePolicy::default(),
            defaults: PageOptions::default(),
        }
    }

    /// Store over HTTP as described by `config`.
    ///
    /// No request is made; connectivity can be checked with [`CouchStore::ping`].
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config.server));
        tracing::info!(
            target: "divan::store",
            url = %config.server.url,
            db = %config.database,
            read_size = config.read_size,
            purge = ?config.purge,
            "Store configured"
        );
        Ok(Self::new(config.database.clone(), transport)
            .with_purge_policy(config.purge)
            .with_default_options(config.page_options()?))
    }

    /// Replace the sink that receives `_find` warnings.
    pub fn with_warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the purge policy.
    pub fn with_purge_policy(mut self, purge: PurgePolicy) -> Self {
        self.purge = purge;
        self
    }

    /// Options used when a read passes `None`.
    pub fn with_default_options(mut self, defaults: PageOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Database name
    pub fn database(&self) -> &str {
        self.gateway.database()
    }

    /// Underlying gateway
    pub fn gateway(&self) -> &DocumentGateway {
        &self.gateway
    }

    /// Purge policy in effect
    pub fn purge_policy(&self) -> PurgePolicy {
        self.purge
    }

    /// `GET /{db}`; fails if the server or database is unreachable.
    pub async fn ping(&self) -> Result<DatabaseInfo> {
        self.gateway.database_info().await
    }

    /// Direct read by id; `None` when absent.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        self.gateway.get(id).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// At most one document matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `Error::MultipleResults` if the query matches more than one
    /// document, and validation errors before any request.
    pub async fn find(
        &self,
        query: impl Into<Query>,
        options: Option<PageOptions>,
    ) -> Result<Option<Document>> {
        let query = query.into();
        if let Query::ById(id) = &query {
            return self.gateway.get(id).await;
        }
        let options = single_result_options(options.unwrap_or(self.defaults))?;
        let cursor = open(&self.gateway, query, options, self.sink.clone())?;
        reduce_single(cursor).await
    }

    /// Lazy cursor over every document matching `query`.
    ///
    /// Validation happens here; the first page is requested on the first
    /// call to [`DocumentCursor::next`].
    pub fn filter(&self, query: impl Into<Query>, options: Option<PageOptions>) -> Result<DocumentCursor> {
        open(
            &self.gateway,
            query.into(),
            options.unwrap_or(self.defaults),
            self.sink.clone(),
        )
    }

    /// [`CouchStore::find`] over untyped query and options values.
    ///
    /// A `null` options value selects the store defaults.
    pub async fn find_json(&self, query: &Value, options: &Value) -> Result<Option<Document>> {
        let query = Query::from_json(query)?;
        let options = self.options_from_json(options)?;
        self.find(query, options).await
    }

    /// [`CouchStore::filter`] over untyped query and options values.
    pub fn filter_json(&self, query: &Value, options: &Value) -> Result<DocumentCursor> {
        let query = Query::from_json(query)?;
        let options = self.options_from_json(options)?;
        self.filter(query, options)
    }

    fn options_from_json(&self, options: &Value) -> Result<Option<PageOptions>> {
        if options.is_null() {
            return Ok(None);
        }
        let mut parsed = PageOptions::from_json(options)?;
        if options.get("readSize").map_or(true, Value::is_null) {
            parsed = parsed.with_read_size(self.defaults.read_size())?;
        }
        Ok(Some(parsed))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Create, update or tombstone `document`.
    ///
    /// Returns the document with its new revision.
    pub async fn write(&self, document: Document) -> Result<Document> {
        self.gateway.upsert(document).await
    }

    /// Tombstone `document`. Its `revision` must be current.
    pub async fn delete(&self, mut document: Document) -> Result<Document> {
        document.deleted = true;
        self.gateway.upsert(document).await
    }

    /// Permanently remove one revision of a document.
    ///
    /// # Errors
    ///
    /// Returns `Error::PurgeUnsupported` without contacting the server when
    /// the policy is [`PurgePolicy::Disabled`].
    pub async fn purge(&self, id: &str, revision: &str) -> Result<()> {
        if self.purge == PurgePolicy::Disabled {
            tracing::debug!(target: "divan::store", db = %self.database(), id, "Purge refused by policy");
            return Err(Error::PurgeUnsupported);
        }
        let response = self.gateway.purge(id, revision).await?;
        tracing::debug!(
            target: "divan::store",
            db = %self.database(),
            id,
            purged = response.purged.len(),
            "Purge complete"
        );
        Ok(())
    }
}
