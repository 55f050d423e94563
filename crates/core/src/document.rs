//! Document type
//!
//! A `Document` is an open JSON object with three reserved fields:
//!
//! - `_id`: stable identifier
//! - `_rev`: opaque revision token assigned by the server on every write
//! - `_deleted`: tombstone marker
//!
//! Any other top-level member, including CouchDB metadata such as
//! `_attachments` or `_conflicts`, is kept in [`Document::fields`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier prefix reserved for design documents.
pub const DESIGN_DOC_PREFIX: &str = "_design/";

/// Returns true if `id` names a design document.
pub fn is_design_doc_id(id: &str) -> bool {
    id.starts_with(DESIGN_DOC_PREFIX)
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A CouchDB document.
///
/// Documents read from the server always carry `id` and `revision`.
/// A document submitted for update must carry the `revision` it supersedes,
/// otherwise the server rejects the write as a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier (`_id`)
    #[serde(rename = "_id")]
    pub id: String,

    /// Revision token (`_rev`); `None` until first written
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Tombstone marker (`_deleted`)
    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// User fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document with a fresh UUID v4 identifier.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string())
    }

    /// Create an empty document with the given identifier.
    pub fn with_id(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            revision: None,
            deleted: false,
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Read a user field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a user field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// True if this is a design document.
    pub fn is_design(&self) -> bool {
        is_design_doc_id(&self.id)
    }

    /// Decode a document from a JSON value.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Encode this document as a JSON value.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
