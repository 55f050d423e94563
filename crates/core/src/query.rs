//! Query types
//!
//! A [`Query`] is an explicit tagged value built by the caller. Untyped JSON
//! coming from a host abstraction is converted at the boundary with
//! [`Query::from_json`], which applies the structural rules below and
//! rejects shapes that would match more than one of them.
//!
//! | Shape | Variant |
//! |-------|---------|
//! | string | `ById` |
//! | array of strings | `ByIdList` |
//! | object with `selector` | `Mango` |
//! | object with `designDoc` and `viewName` | `View` (named) |
//! | any other object | `View` (`_all_docs`) |

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

/// Which view a [`ViewQuery`] reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTarget {
    /// The built-in `_all_docs` view
    AllDocs,
    /// A view defined in a design document
    Design {
        /// Design document name, without the `_design/` prefix
        design_doc: String,
        /// View name inside the design document
        view_name: String,
    },
}

impl ViewTarget {
    /// Build a design-document target, accepting names with or without the
    /// `_design/` prefix.
    pub fn design(design_doc: impl Into<String>, view_name: impl Into<String>) -> Self {
        let design_doc = design_doc.into();
        let design_doc = design_doc
            .strip_prefix(crate::document::DESIGN_DOC_PREFIX)
            .map(str::to_string)
            .unwrap_or(design_doc);
        ViewTarget::Design {
            design_doc,
            view_name: view_name.into(),
        }
    }
}

/// Parameters of a view query.
///
/// `key` is a shorthand for `start_key == end_key == key`. When `keys` is
/// set the query runs in key-list mode and neither start/end bounds nor
/// `skip` are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    /// View to read
    pub target: ViewTarget,
    /// Exact key
    pub key: Option<Value>,
    /// Explicit key list
    pub keys: Option<Vec<Value>>,
    /// Lower bound key (upper bound when descending)
    pub start_key: Option<Value>,
    /// Tie-breaker document id for `start_key`
    pub start_key_doc_id: Option<String>,
    /// Upper bound key (lower bound when descending)
    pub end_key: Option<Value>,
    /// Tie-breaker document id for `end_key`
    pub end_key_doc_id: Option<String>,
    /// Reverse view order
    pub descending: bool,
    /// Include rows matching `end_key` exactly
    pub inclusive_end: bool,
    /// Rows to skip before the first emitted row
    pub skip: Option<u64>,
    /// Include `_conflicts` in emitted documents
    pub conflicts: bool,
}

impl ViewQuery {
    /// Query against a target with default parameters.
    pub fn new(target: ViewTarget) -> Self {
        ViewQuery {
            target,
            key: None,
            keys: None,
            start_key: None,
            start_key_doc_id: None,
            end_key: None,
            end_key_doc_id: None,
            descending: false,
            inclusive_end: true,
            skip: None,
            conflicts: false,
        }
    }

    /// Query against `_all_docs`.
    pub fn all_docs() -> Self {
        Self::new(ViewTarget::AllDocs)
    }

    /// Query against `_design/{design_doc}/_view/{view_name}`.
    pub fn design(design_doc: impl Into<String>, view_name: impl Into<String>) -> Self {
        Self::new(ViewTarget::design(design_doc, view_name))
    }

    /// Restrict to one key.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Restrict to an explicit key list.
    pub fn keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Set the start key.
    pub fn start_key(mut self, key: impl Into<Value>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    /// Set the end key.
    pub fn end_key(mut self, key: impl Into<Value>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    /// Reverse the view order.
    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    /// Control whether `end_key` itself is included.
    pub fn inclusive_end(mut self, inclusive_end: bool) -> Self {
        self.inclusive_end = inclusive_end;
        self
    }

    /// Skip rows before the first emitted one. Not allowed with `keys`.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Check parameter combinations the view cursor cannot page through.
    pub fn validate(&self) -> Result<()> {
        if self.keys.is_some() {
            if self.key.is_some() {
                return Err(Error::InvalidQuery(
                    "`key` and `keys` are mutually exclusive".to_string(),
                ));
            }
            if self.start_key.is_some()
                || self.end_key.is_some()
                || self.start_key_doc_id.is_some()
                || self.end_key_doc_id.is_some()
            {
                return Err(Error::InvalidQuery(
                    "`keys` cannot be combined with start/end bounds".to_string(),
                ));
            }
            // Key-list pages are key chunks, not row windows.
            if self.skip.is_some() {
                return Err(Error::InvalidQuery(
                    "`keys` cannot be combined with `skip`".to_string(),
                ));
            }
        }
        if self.key.is_some() && (self.start_key.is_some() || self.end_key.is_some()) {
            return Err(Error::InvalidQuery(
                "`key` cannot be combined with `startKey`/`endKey`".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of a Mango (`_find`) query.
#[derive(Debug, Clone, PartialEq)]
pub struct MangoQuery {
    /// Selector object
    pub selector: Value,
    /// Sort order, passed through verbatim
    pub sort: Option<Value>,
    /// Field projection
    pub fields: Option<Vec<String>>,
    /// Index hint: design document name or `[ddoc, index]`
    pub use_index: Option<Value>,
    /// Read quorum (`r`)
    pub read_quorum: Option<u32>,
    /// Documents to skip before the first emitted one
    pub skip: Option<u64>,
    /// Ask the server for execution statistics
    pub execution_stats: bool,
}

impl MangoQuery {
    /// Query with the given selector.
    pub fn new(selector: Value) -> Self {
        MangoQuery {
            selector,
            sort: None,
            fields: None,
            use_index: None,
            read_quorum: None,
            skip: None,
            execution_stats: false,
        }
    }

    /// Set the sort order.
    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Project onto a field list.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the index hint.
    pub fn use_index(mut self, index: impl Into<Value>) -> Self {
        self.use_index = Some(index.into());
        self
    }

    /// Check that the selector is an object.
    pub fn validate(&self) -> Result<()> {
        if !self.selector.is_object() {
            return Err(Error::InvalidQuery(
                "`selector` must be a JSON object".to_string(),
            ));
        }
        Ok(())
    }
}

/// A query, one variant per dispatch strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Direct lookup of one document
    ById(String),
    /// Lookup of several documents through `_all_docs` with a key list
    ByIdList(Vec<String>),
    /// Mango selector query
    Mango(MangoQuery),
    /// View query
    View(ViewQuery),
}

/// Object members that mark a value as a view query.
const VIEW_FIELDS: &[&str] = &[
    "designDoc",
    "viewName",
    "key",
    "keys",
    "startKey",
    "startKeyDocId",
    "endKey",
    "endKeyDocId",
    "descending",
    "inclusiveEnd",
    "conflicts",
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawMangoQuery {
    selector: Value,
    sort: Option<Value>,
    fields: Option<Vec<String>>,
    use_index: Option<Value>,
    read_quorum: Option<u32>,
    skip: Option<u64>,
    #[serde(default)]
    execution_stats: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawViewQuery {
    design_doc: Option<String>,
    view_name: Option<String>,
    key: Option<Value>,
    keys: Option<Vec<Value>>,
    start_key: Option<Value>,
    start_key_doc_id: Option<String>,
    end_key: Option<Value>,
    end_key_doc_id: Option<String>,
    #[serde(default)]
    descending: bool,
    inclusive_end: Option<bool>,
    skip: Option<u64>,
    #[serde(default)]
    conflicts: bool,
}

impl Query {
    /// Classify an untyped JSON query.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` for values that match no rule, that
    /// match both the Mango and view rules, or that carry unknown members.
    pub fn from_json(value: &Value) -> Result<Query> {
        match value {
            Value::String(id) => {
                let query = Query::ById(id.clone());
                query.validate()?;
                Ok(query)
            }
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        Error::InvalidQuery(format!(
                            "identifier list must contain only strings, found {}",
                            item
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Query::ByIdList),
            Value::Object(map) => {
                if map.contains_key("selector") {
                    if let Some(field) = VIEW_FIELDS.iter().find(|f| map.contains_key(**f)) {
                        return Err(Error::InvalidQuery(format!(
                            "ambiguous query: `selector` combined with view field `{}`",
                            field
                        )));
                    }
                    let raw: RawMangoQuery = serde_json::from_value(value.clone())
                        .map_err(|e| Error::InvalidQuery(e.to_string()))?;
                    let query = MangoQuery {
                        selector: raw.selector,
                        sort: raw.sort,
                        fields: raw.fields,
                        use_index: raw.use_index,
                        read_quorum: raw.read_quorum,
                        skip: raw.skip,
                        execution_stats: raw.execution_stats,
                    };
                    query.validate()?;
                    return Ok(Query::Mango(query));
                }

                let raw: RawViewQuery = serde_json::from_value(value.clone())
                    .map_err(|e| Error::InvalidQuery(e.to_string()))?;
                let target = match (raw.design_doc, raw.view_name) {
                    (Some(design_doc), Some(view_name)) => {
                        ViewTarget::design(design_doc, view_name)
                    }
                    (None, None) => ViewTarget::AllDocs,
                    _ => {
                        return Err(Error::InvalidQuery(
                            "`designDoc` and `viewName` must be given together".to_string(),
                        ))
                    }
                };
                let query = ViewQuery {
                    target,
                    key: raw.key,
                    keys: raw.keys,
                    start_key: raw.start_key,
                    start_key_doc_id: raw.start_key_doc_id,
                    end_key: raw.end_key,
                    end_key_doc_id: raw.end_key_doc_id,
                    descending: raw.descending,
                    inclusive_end: raw.inclusive_end.unwrap_or(true),
                    skip: raw.skip,
                    conflicts: raw.conflicts,
                };
                query.validate()?;
                Ok(Query::View(query))
            }
            other => Err(Error::InvalidQuery(format!(
                "cannot classify query value {}",
                other
            ))),
        }
    }

    /// Check variant-specific constraints.
    pub fn validate(&self) -> Result<()> {
        match self {
            Query::ById(id) if id.is_empty() => Err(Error::InvalidQuery(
                "document id must not be empty".to_string(),
            )),
            Query::ById(_) | Query::ByIdList(_) => Ok(()),
            Query::Mango(q) => q.validate(),
            Query::View(q) => q.validate(),
        }
    }

    /// Short strategy name used in log fields.
    pub fn strategy(&self) -> &'static str {
        match self {
            Query::ById(_) => "by_id",
            Query::ByIdList(_) => "by_id_list",
            Query::Mango(_) => "mango",
            Query::View(_) => "view",
        }
    }
}

impl From<MangoQuery> for Query {
    fn from(q: MangoQuery) -> Self {
        Query::Mango(q)
    }
}

impl From<ViewQuery> for Query {
    fn from(q: ViewQuery) -> Self {
        Query::View(q)
    }
}
