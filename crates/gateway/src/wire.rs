//! Request and response bodies of the CouchDB endpoints the gateway uses
//!
//! Request bodies are immutable values built fresh for every page.

use divan_core::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Views
// ============================================================================

/// Body of one `POST` to a view or `_all_docs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewPageRequest {
    /// Key list for this page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<Value>>,
    /// Start key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startkey: Option<Value>,
    /// Start document id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startkey_docid: Option<String>,
    /// End key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endkey: Option<Value>,
    /// End document id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endkey_docid: Option<String>,
    /// Maximum rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Rows to skip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    /// Reverse order
    pub descending: bool,
    /// Include rows matching `endkey`
    pub inclusive_end: bool,
    /// Attach documents to rows
    pub include_docs: bool,
    /// Reduce flag; only sent to design views
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce: Option<bool>,
    /// Include `_conflicts`
    #[serde(skip_serializing_if = "is_false")]
    pub conflicts: bool,
}

impl Default for ViewPageRequest {
    fn default() -> Self {
        ViewPageRequest {
            keys: None,
            startkey: None,
            startkey_docid: None,
            endkey: None,
            endkey_docid: None,
            limit: None,
            skip: None,
            descending: false,
            inclusive_end: true,
            include_docs: true,
            reduce: None,
            conflicts: false,
        }
    }
}

/// One row of a view response.
///
/// Rows for keys with no match carry `error` and neither `id` nor `doc`;
/// rows for deleted documents carry `id` and a null `doc`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewRow {
    /// Emitting document id
    #[serde(default)]
    pub id: Option<String>,
    /// Emitted key
    #[serde(default)]
    pub key: Value,
    /// Emitted value
    #[serde(default)]
    pub value: Value,
    /// Attached document
    #[serde(default)]
    pub doc: Option<Value>,
    /// Per-row error (e.g. "not_found")
    #[serde(default)]
    pub error: Option<String>,
}

/// One page of a view response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewPage {
    /// Rows in the whole view
    #[serde(default)]
    pub total_rows: Option<u64>,
    /// Offset of the first row
    #[serde(default)]
    pub offset: Option<u64>,
    /// Rows of this page
    pub rows: Vec<ViewRow>,
}

// ============================================================================
// Mango
// ============================================================================

/// Body of one `POST /{db}/_find`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MangoPageRequest {
    /// Selector
    pub selector: Value,
    /// Page size
    pub limit: usize,
    /// Documents to skip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    /// Continuation token from the previous page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<String>,
    /// Sort order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
    /// Field projection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Index hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_index: Option<Value>,
    /// Read quorum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<u32>,
    /// Ask for execution statistics
    #[serde(skip_serializing_if = "is_false")]
    pub execution_stats: bool,
}

/// One page of a `_find` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MangoPage {
    /// Matching documents
    pub docs: Vec<Document>,
    /// Continuation token
    #[serde(default)]
    pub bookmark: Option<String>,
    /// Advisory message, e.g. a missing index
    #[serde(default)]
    pub warning: Option<String>,
    /// Execution statistics, when requested
    #[serde(default)]
    pub execution_stats: Option<Value>,
}

// ============================================================================
// Documents and database
// ============================================================================

/// Response of a document write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WriteResponse {
    /// Write accepted
    #[serde(default)]
    pub ok: bool,
    /// Document id
    pub id: String,
    /// New revision
    pub rev: String,
}

/// Response of `POST /{db}/_purge`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PurgeResponse {
    /// Purged revisions per document id
    #[serde(default)]
    pub purged: BTreeMap<String, Vec<String>>,
}

/// Subset of `GET /{db}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseInfo {
    /// Database name
    pub db_name: String,
    /// Live documents
    #[serde(default)]
    pub doc_count: u64,
    /// Deleted documents
    #[serde(default)]
    pub doc_del_count: u64,
}
