//! Query dispatch
//!
//! [`open`] routes a [`Query`] to its strategy and returns a pull-based
//! [`DocumentCursor`]. All validation happens here, before any request.

use crate::mango_cursor::MangoCursor;
use crate::sink::WarningSink;
use crate::view_cursor::ViewCursor;
use divan_core::{Document, PageOptions, Query, Result, ViewQuery};
use divan_gateway::DocumentGateway;
use std::fmt;
use std::sync::Arc;

enum Strategy {
    ById {
        gateway: DocumentGateway,
        id: Option<String>,
    },
    View(ViewCursor),
    Mango(MangoCursor),
}

/// Lazy sequence of documents produced by one query.
///
/// Pages are requested one at a time, only once the previous page has been
/// consumed. Dropping the cursor stops all further requests.
pub struct DocumentCursor {
    strategy: Strategy,
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.strategy {
            Strategy::ById { id, .. } => f.debug_struct("DocumentCursor::ById").field("id", id).finish(),
            Strategy::View(c) => f.debug_tuple("DocumentCursor::View").field(c).finish(),
            Strategy::Mango(c) => f.debug_tuple("DocumentCursor::Mango").field(c).finish(),
        }
    }
}

impl DocumentCursor {
    /// Next document, or `None` once the sequence is exhausted.
    pub async fn next(&mut self) -> Result<Option<Document>> {
        match &mut self.strategy {
            Strategy::ById { gateway, id } => match id.take() {
                Some(id) => gateway.get(&id).await,
                None => Ok(None),
            },
            Strategy::View(cursor) => cursor.next().await,
            Strategy::Mango(cursor) => cursor.next().await,
        }
    }

    /// Drain the remaining documents.
    pub async fn try_collect(mut self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        while let Some(doc) = self.next().await? {
            docs.push(doc);
        }
        Ok(docs)
    }

    /// Requests issued so far
    pub fn pages_fetched(&self) -> usize {
        match &self.strategy {
            Strategy::ById { id, .. } => usize::from(id.is_none()),
            Strategy::View(c) => c.pages_fetched(),
            Strategy::Mango(c) => c.pages_fetched(),
        }
    }
}

/// Route `query` to its strategy.
///
/// | Query | Strategy |
/// |-------|----------|
/// | `ById` | one direct `GET` |
/// | `ByIdList` | `_all_docs` in key-list mode |
/// | `Mango` | `_find` with bookmarks |
/// | `View` | view cursor, key-list mode iff `keys` is set |
///
/// # Errors
///
/// Returns `Error::InvalidQuery` if the query fails validation. No request
/// is issued in that case.
pub fn open(
    gateway: &DocumentGateway,
    query: Query,
    options: PageOptions,
    sink: Arc<dyn WarningSink>,
) -> Result<DocumentCursor> {
    tracing::debug!(
        target: "divan::store",
        db = %gateway.database(),
        strategy = query.strategy(),
        read_size = options.read_size(),
        limit = ?options.limit(),
        "Dispatching query"
    );
    query.validate()?;
    let strategy = match query {
        Query::ById(id) => Strategy::ById {
            gateway: gateway.clone(),
            id: Some(id),
        },
        Query::ByIdList(ids) => {
            Strategy::View(ViewCursor::new(gateway.clone(), ViewQuery::all_docs().keys(ids), options)?)
        }
        Query::Mango(q) => Strategy::Mango(MangoCursor::new(gateway.clone(), q, options, sink)?),
        Query::View(q) => Strategy::View(ViewCursor::new(gateway.clone(), q, options)?),
    };
    Ok(DocumentCursor { strategy })
}
