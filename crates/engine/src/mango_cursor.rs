//! Mango pagination cursor
//!
//! Pages through `_find` results by carrying the bookmark of each response
//! into the next request. Per-page warnings go to the injected sink.

use crate::sink::WarningSink;
use divan_core::{Document, MangoQuery, PageOptions, Result};
use divan_gateway::{DocumentGateway, MangoPageRequest};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Lazy, finite, non-restartable sequence of documents from `_find`.
pub struct MangoCursor {
    gateway: DocumentGateway,
    query: MangoQuery,
    options: PageOptions,
    sink: Arc<dyn WarningSink>,
    remaining: Option<usize>,
    bookmark: Option<String>,
    buffer: VecDeque<Document>,
    exhausted: bool,
    pages: usize,
}

impl fmt::Debug for MangoCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MangoCursor")
            .field("query", &self.query)
            .field("remaining", &self.remaining)
            .field("bookmark", &self.bookmark)
            .field("exhausted", &self.exhausted)
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl MangoCursor {
    /// Cursor over `query`; no request is issued until [`MangoCursor::next`].
    pub fn new(
        gateway: DocumentGateway,
        query: MangoQuery,
        options: PageOptions,
        sink: Arc<dyn WarningSink>,
    ) -> Result<Self> {
        query.validate()?;
        Ok(MangoCursor {
            gateway,
            query,
            options,
            sink,
            remaining: options.limit(),
            bookmark: None,
            buffer: VecDeque::new(),
            exhausted: false,
            pages: 0,
        })
    }

    /// Page requests issued so far
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Next document, fetching a new page when the current one is consumed.
    pub async fn next(&mut self) -> Result<Option<Document>> {
        loop {
            if let Some(doc) = self.buffer.pop_front() {
                return Ok(Some(doc));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    fn next_request(&self, page_size: usize) -> MangoPageRequest {
        // Projections keep `_id` and `_rev` so emitted documents stay addressable.
        let fields = self.query.fields.as_ref().map(|fields| {
            let mut fields = fields.clone();
            for reserved in ["_id", "_rev"] {
                if !fields.iter().any(|f| f == reserved) {
                    fields.push(reserved.to_string());
                }
            }
            fields
        });
        let first_page = self.bookmark.is_none();
        MangoPageRequest {
            selector: self.query.selector.clone(),
            limit: page_size,
            skip: if first_page { self.query.skip } else { None },
            bookmark: self.bookmark.clone(),
            sort: self.query.sort.clone(),
            fields,
            use_index: self.query.use_index.clone(),
            r: self.query.read_quorum,
            execution_stats: self.query.execution_stats,
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page_size = self.options.page_size(self.remaining);
        let request = self.next_request(page_size);
        let page = self.gateway.query_mango(&request).await?;
        self.pages += 1;

        if let Some(warning) = page.warning.as_deref().filter(|w| !w.is_empty()) {
            self.sink.warning(self.gateway.database(), warning);
        }
        if let Some(stats) = &page.execution_stats {
            tracing::debug!(target: "divan::mango", stats = %stats, "Execution stats");
        }

        let doc_count = page.docs.len();
        if doc_count < page_size {
            self.exhausted = true;
        }
        match page.bookmark {
            Some(bookmark) => self.bookmark = Some(bookmark),
            None if !self.exhausted => {
                tracing::warn!(
                    target: "divan::mango",
                    db = %self.gateway.database(),
                    "Full page without bookmark, stopping"
                );
                self.exhausted = true;
            }
            None => {}
        }

        for doc in page.docs {
            if self.remaining == Some(0) {
                break;
            }
            self.buffer.push_back(doc);
            if let Some(r) = self.remaining.as_mut() {
                *r -= 1;
            }
        }
        if self.remaining == Some(0) {
            self.exhausted = true;
        }

        tracing::debug!(
            target: "divan::mango",
            db = %self.gateway.database(),
            page = self.pages,
            page_size,
            docs = doc_count,
            exhausted = self.exhausted,
            "Fetched find page"
        );
        Ok(())
    }

    /// Drain the remaining documents.
    pub async fn try_collect(mut self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        while let Some(doc) = self.next().await? {
            docs.push(doc);
        }
        Ok(docs)
    }
}
