//! Document gateway
//!
//! Issues the primitive operations against one database: get by id, upsert,
//! purge, one view page and one Mango page. Pagination lives above this
//! layer; every method here is exactly one round trip.

use crate::transport::{encode_doc_id, encode_segment, CouchTransport, HttpRequest};
use crate::wire::{
    DatabaseInfo, MangoPage, MangoPageRequest, PurgeResponse, ViewPage, ViewPageRequest,
    WriteResponse,
};
use divan_core::{Document, Error, Result, ViewTarget};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Gateway to one CouchDB database.
#[derive(Clone)]
pub struct DocumentGateway {
    database: String,
    transport: Arc<dyn CouchTransport>,
}

impl fmt::Debug for DocumentGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentGateway")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// An empty id would address the database itself.
fn check_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidQuery("document id must not be empty".to_string()));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::Decode(format!("unexpected {} response: {}", what, e)))
}

impl DocumentGateway {
    /// Gateway for `database` over `transport`.
    pub fn new(database: impl Into<String>, transport: Arc<dyn CouchTransport>) -> Self {
        DocumentGateway {
            database: database.into(),
            transport,
        }
    }

    /// Database name
    pub fn database(&self) -> &str {
        &self.database
    }

    fn db_path(&self) -> String {
        encode_segment(&self.database)
    }

    fn doc_path(&self, id: &str) -> String {
        format!("{}/{}", self.db_path(), encode_doc_id(id))
    }

    /// Path of a view page request.
    pub fn view_path(&self, target: &ViewTarget) -> String {
        match target {
            ViewTarget::AllDocs => format!("{}/_all_docs", self.db_path()),
            ViewTarget::Design {
                design_doc,
                view_name,
            } => format!(
                "{}/_design/{}/_view/{}",
                self.db_path(),
                encode_segment(design_doc),
                encode_segment(view_name)
            ),
        }
    }

    /// `GET /{db}`
    pub async fn database_info(&self) -> Result<DatabaseInfo> {
        let value = self.transport.execute(HttpRequest::get(self.db_path())).await?;
        decode(value, "database info")
    }

    /// `GET /{db}/{id}`; a 404 is `Ok(None)`.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        check_id(id)?;
        match self.transport.execute(HttpRequest::get(self.doc_path(id))).await {
            Ok(value) => decode(value, "document").map(Some),
            Err(e) if e.is_not_found() => {
                tracing::debug!(target: "divan::gateway", db = %self.database, id, "Document not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `PUT /{db}/{id}` for create, update and tombstone alike.
    ///
    /// Returns the input with `id` and `revision` refreshed from the response.
    pub async fn upsert(&self, mut document: Document) -> Result<Document> {
        check_id(&document.id)?;
        let body = document.to_value()?;
        let value = self
            .transport
            .execute(HttpRequest::put(self.doc_path(&document.id), body))
            .await?;
        let response: WriteResponse = decode(value, "write")?;
        tracing::debug!(
            target: "divan::gateway",
            db = %self.database,
            id = %response.id,
            rev = %response.rev,
            deleted = document.deleted,
            "Document written"
        );
        document.id = response.id;
        document.revision = Some(response.rev);
        Ok(document)
    }

    /// `POST /{db}/_purge` for one document revision.
    pub async fn purge(&self, id: &str, revision: &str) -> Result<PurgeResponse> {
        let mut body = serde_json::Map::new();
        body.insert(id.to_string(), json!([revision]));
        let value = self
            .transport
            .execute(HttpRequest::post(
                format!("{}/_purge", self.db_path()),
                Value::Object(body),
            ))
            .await?;
        decode(value, "purge")
    }

    /// One page of a view or `_all_docs`.
    pub async fn query_view(&self, target: &ViewTarget, body: &ViewPageRequest) -> Result<ViewPage> {
        let path = self.view_path(target);
        let value = self
            .transport
            .execute(HttpRequest::post(path.as_str(), serde_json::to_value(body)?))
            .await?;
        let page: ViewPage = decode(value, "view")?;
        tracing::debug!(
            target: "divan::gateway",
            path = %path,
            limit = ?body.limit,
            keys = body.keys.as_ref().map(Vec::len),
            rows = page.rows.len(),
            "View page"
        );
        Ok(page)
    }

    /// One page of `_find`.
    pub async fn query_mango(&self, body: &MangoPageRequest) -> Result<MangoPage> {
        let value = self
            .transport
            .execute(HttpRequest::post(
                format!("{}/_find", self.db_path()),
                serde_json::to_value(body)?,
            ))
            .await?;
        let page: MangoPage = decode(value, "find")?;
        tracing::debug!(
            target: "divan::gateway",
            db = %self.database,
            limit = body.limit,
            docs = page.docs.len(),
            has_bookmark = body.bookmark.is_some(),
            "Find page"
        );
        Ok(page)
    }
}
