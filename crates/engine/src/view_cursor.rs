//! View pagination cursor
//!
//! Pages through a design-document view or `_all_docs` in one of two
//! mutually exclusive modes:
//!
//! - **Range**: each page starts at the last row of the previous one
//!   (`startkey` + `startkey_docid`, `skip = 1`), so deep pages cost the
//!   same as the first.
//! - **Key list**: the explicit `keys` are consumed front to back, one
//!   page-sized chunk per request.
//!
//! Rows for design documents and rows without a document (missing keys,
//! deleted documents) are never emitted.

use divan_core::{is_design_doc_id, Document, Error, PageOptions, Result, ViewQuery, ViewTarget};
use divan_gateway::{DocumentGateway, ViewPageRequest, ViewRow};
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug)]
enum Position {
    /// Pending keys, consumed in order
    Keys(VecDeque<Value>),
    /// Start of the next page; `None` before the first page
    Range(Option<(Value, String)>),
}

/// Lazy, finite, non-restartable sequence of documents from a view.
#[derive(Debug)]
pub struct ViewCursor {
    gateway: DocumentGateway,
    query: ViewQuery,
    options: PageOptions,
    remaining: Option<usize>,
    position: Position,
    buffer: VecDeque<Document>,
    exhausted: bool,
    pages: usize,
}

impl ViewCursor {
    /// Cursor over `query`; no request is issued until [`ViewCursor::next`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for parameter combinations that cannot
    /// be paged (e.g. `keys` with start/end bounds).
    pub fn new(gateway: DocumentGateway, mut query: ViewQuery, options: PageOptions) -> Result<Self> {
        query.validate()?;
        let position = match query.keys.take() {
            Some(keys) => Position::Keys(keys.into()),
            None => Position::Range(None),
        };
        Ok(ViewCursor {
            gateway,
            query,
            options,
            remaining: options.limit(),
            position,
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

    fn base_request(&self) -> ViewPageRequest {
        ViewPageRequest {
            descending: self.query.descending,
            include_docs: true,
            reduce: match self.query.target {
                ViewTarget::AllDocs => None,
                ViewTarget::Design { .. } => Some(false),
            },
            conflicts: self.query.conflicts,
            ..ViewPageRequest::default()
        }
    }

    /// Build the next page request, or `None` when nothing is left to ask for.
    ///
    /// In key-list mode this pops the page's keys off the queue.
    fn next_request(&mut self, page_size: usize) -> Option<ViewPageRequest> {
        let mut request = self.base_request();
        match &mut self.position {
            Position::Keys(pending) => {
                if pending.is_empty() {
                    return None;
                }
                let take = page_size.min(pending.len());
                request.keys = Some(pending.drain(..take).collect());
            }
            Position::Range(start) => {
                // `key` is paged as a one-key range so the start can advance.
                let (lower, upper) = match &self.query.key {
                    Some(key) => (Some(key.clone()), Some(key.clone())),
                    None => (self.query.start_key.clone(), self.query.end_key.clone()),
                };
                request.endkey = upper;
                request.endkey_docid = self.query.end_key_doc_id.clone();
                request.inclusive_end = self.query.key.is_some() || self.query.inclusive_end;
                request.limit = Some(page_size);
                match start {
                    None => {
                        request.startkey = lower;
                        request.startkey_docid = self.query.start_key_doc_id.clone();
                        request.skip = self.query.skip;
                    }
                    Some((key, doc_id)) => {
                        request.startkey = Some(key.clone());
                        request.startkey_docid = Some(doc_id.clone());
                        request.skip = Some(1);
                    }
                }
            }
        }
        Some(request)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page_size = self.options.page_size(self.remaining);
        let Some(request) = self.next_request(page_size) else {
            self.exhausted = true;
            return Ok(());
        };

        let page = self.gateway.query_view(&self.query.target, &request).await?;
        self.pages += 1;
        let row_count = page.rows.len();

        match &mut self.position {
            Position::Keys(pending) => {
                if pending.is_empty() {
                    self.exhausted = true;
                }
            }
            Position::Range(start) => {
                if row_count < page_size {
                    self.exhausted = true;
                } else {
                    match page.rows.last() {
                        Some(ViewRow { id: Some(id), key, .. }) => {
                            *start = Some((key.clone(), id.clone()));
                        }
                        _ => self.exhausted = true,
                    }
                }
            }
        }

        let mut emitted = 0usize;
        for row in page.rows {
            if self.remaining == Some(0) {
                break;
            }
            if row.id.as_deref().is_some_and(is_design_doc_id) {
                continue;
            }
            let Some(doc) = row.doc.filter(|d| !d.is_null()) else {
                continue;
            };
            let doc = Document::from_value(doc)
                .map_err(|e| Error::Decode(format!("view row document: {}", e)))?;
            self.buffer.push_back(doc);
            emitted += 1;
            if let Some(r) = self.remaining.as_mut() {
                *r -= 1;
            }
        }
        if self.remaining == Some(0) {
            self.exhausted = true;
        }

        tracing::debug!(
            target: "divan::view",
            db = %self.gateway.database(),
            page = self.pages,
            page_size,
            rows = row_count,
            emitted,
            exhausted = self.exhausted,
            "Fetched view page"
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

#[cfg(test)]
mod tests {
    use super::*;
    use divan_gateway::MemoryCouch;
    use serde_json::json;
    use std::sync::Arc;

    fn setup(n: usize) -> (Arc<MemoryCouch>, DocumentGateway) {
        let couch = Arc::new(MemoryCouch::new());
        for i in 0..n {
            couch.seed(json!({"_id": format!("doc{:03}", i), "n": i}));
        }
        let gateway = DocumentGateway::new("app", couch.clone());
        (couch, gateway)
    }

    fn ids(docs: &[Document]) -> Vec<String> {
        docs.iter().map(|d| d.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_range_pages_do_not_repeat_rows() {
        let (couch, gateway) = setup(7);
        let options = PageOptions::new(Some(3), None).unwrap();
        let cursor = ViewCursor::new(gateway, ViewQuery::all_docs(), options).unwrap();
        let docs = cursor.try_collect().await.unwrap();

        assert_eq!(
            ids(&docs),
            (0..7).map(|i| format!("doc{:03}", i)).collect::<Vec<_>>()
        );
        // 3 + 3 + 1 rows: the short third page ends the sequence
        assert_eq!(couch.request_count("_all_docs"), 3);

        let second = couch.requests()[1].body.clone().unwrap();
        assert_eq!(second["startkey"], json!("doc002"));
        assert_eq!(second["startkey_docid"], json!("doc002"));
        assert_eq!(second["skip"], json!(1));
        assert_eq!(second["limit"], json!(3));
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_page() {
        let (couch, gateway) = setup(4);
        let options = PageOptions::new(Some(2), None).unwrap();
        let docs = ViewCursor::new(gateway, ViewQuery::all_docs(), options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(docs.len(), 4);
        assert_eq!(couch.request_count("_all_docs"), 3);
    }

    #[tokio::test]
    async fn test_limit_shrinks_page_size() {
        let (couch, gateway) = setup(10);
        let options = PageOptions::new(Some(4), Some(6)).unwrap();
        let docs = ViewCursor::new(gateway, ViewQuery::all_docs(), options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(docs.len(), 6);

        let limits: Vec<Value> = couch
            .requests()
            .iter()
            .map(|r| r.body.as_ref().unwrap()["limit"].clone())
            .collect();
        assert_eq!(limits, [json!(4), json!(2)]);
    }

    #[tokio::test]
    async fn test_design_docs_are_skipped() {
        let (couch, gateway) = setup(2);
        couch.seed(json!({"_id": "_design/by", "views": {}}));
        let docs = ViewCursor::new(gateway, ViewQuery::all_docs(), PageOptions::default())
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids(&docs), ["doc000", "doc001"]);
    }

    #[tokio::test]
    async fn test_key_list_mode_chunks_keys() {
        let (couch, gateway) = setup(5);
        let query = ViewQuery::all_docs().keys(["doc004", "doc000", "nope", "doc002"]);
        let options = PageOptions::new(Some(3), None).unwrap();
        let docs = ViewCursor::new(gateway, query, options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids(&docs), ["doc004", "doc000", "doc002"]);
        let requests = couch.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].body.as_ref().unwrap()["keys"],
            json!(["doc004", "doc000", "nope"])
        );
        assert_eq!(requests[1].body.as_ref().unwrap()["keys"], json!(["doc002"]));
        assert!(requests[0].body.as_ref().unwrap().get("startkey").is_none());
    }

    #[tokio::test]
    async fn test_key_list_chunks_shrink_with_limit() {
        let (couch, gateway) = setup(6);
        let query = ViewQuery::all_docs().keys((0..6).map(|i| format!("doc{:03}", i)));
        let options = PageOptions::new(Some(4), Some(5)).unwrap();
        let docs = ViewCursor::new(gateway, query, options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(docs.len(), 5);
        let keys: Vec<Value> = couch
            .requests()
            .iter()
            .map(|r| r.body.as_ref().unwrap()["keys"].clone())
            .collect();
        assert_eq!(
            keys,
            [
                json!(["doc000", "doc001", "doc002", "doc003"]),
                json!(["doc004"])
            ]
        );
    }

    #[tokio::test]
    async fn test_key_list_with_skip_is_rejected_before_request() {
        let (couch, gateway) = setup(3);
        let query = ViewQuery::all_docs().keys(["doc000", "doc001", "doc002"]).skip(2);
        let err = ViewCursor::new(gateway, query, PageOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
        assert!(couch.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_key_list_issues_no_request() {
        let (couch, gateway) = setup(1);
        let query = ViewQuery::all_docs().keys(Vec::<String>::new());
        let mut cursor = ViewCursor::new(gateway, query, PageOptions::default()).unwrap();
        assert_eq!(cursor.next().await.unwrap(), None);
        assert!(couch.requests().is_empty());
    }

    #[tokio::test]
    async fn test_named_view_with_key_pages_within_key() {
        let couch = Arc::new(MemoryCouch::new());
        for (id, color) in [("a", "red"), ("b", "blue"), ("c", "red"), ("d", "red")] {
            couch.seed(json!({"_id": id, "color": color}));
        }
        let gateway = DocumentGateway::new("app", couch.clone());
        let query = ViewQuery::design("by", "color").key("red");
        let options = PageOptions::new(Some(2), None).unwrap();
        let docs = ViewCursor::new(gateway, query, options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids(&docs), ["a", "c", "d"]);

        let first = couch.requests()[0].body.clone().unwrap();
        assert_eq!(first["reduce"], json!(false));
        assert_eq!(first["startkey"], json!("red"));
        assert_eq!(first["endkey"], json!("red"));
        assert!(first.get("key").is_none());
    }

    #[tokio::test]
    async fn test_descending_with_end_key_exclusive() {
        let (_couch, gateway) = setup(6);
        let query = ViewQuery::all_docs()
            .descending(true)
            .start_key("doc004")
            .end_key("doc001")
            .inclusive_end(false);
        let options = PageOptions::new(Some(2), None).unwrap();
        let docs = ViewCursor::new(gateway, query, options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids(&docs), ["doc004", "doc003", "doc002"]);
    }

    #[tokio::test]
    async fn test_caller_skip_applies_to_first_page_only() {
        let (couch, gateway) = setup(6);
        let options = PageOptions::new(Some(2), None).unwrap();
        let docs = ViewCursor::new(gateway, ViewQuery::all_docs().skip(3), options)
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(ids(&docs), ["doc003", "doc004", "doc005"]);
        assert_eq!(couch.requests()[0].body.as_ref().unwrap()["skip"], json!(3));
        assert_eq!(couch.requests()[1].body.as_ref().unwrap()["skip"], json!(1));
    }

    #[tokio::test]
    async fn test_dropping_cursor_stops_fetching() {
        let (couch, gateway) = setup(10);
        let options = PageOptions::new(Some(2), None).unwrap();
        let mut cursor = ViewCursor::new(gateway, ViewQuery::all_docs(), options).unwrap();
        cursor.next().await.unwrap();
        cursor.next().await.unwrap();
        assert_eq!(cursor.pages_fetched(), 1);
        drop(cursor);
        assert_eq!(couch.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (couch, gateway) = setup(3);
        couch.fail_next(503, "service_unavailable");
        let mut cursor = ViewCursor::new(gateway, ViewQuery::all_docs(), PageOptions::default()).unwrap();
        let err = cursor.next().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
