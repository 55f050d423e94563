//! In-memory CouchDB stand-in
//!
//! Implements [`CouchTransport`] over a single in-process database so the
//! gateway and the pagination cursors can be exercised without a server.
//! The database name in request paths is only echoed back by `GET /{db}`.
//!
//! Supported endpoints:
//!
//! | Request | Behaviour |
//! |---------|-----------|
//! | `GET /{db}` | doc counts |
//! | `GET /{db}/{id}` | document, 404 when missing or deleted |
//! | `PUT /{db}/{id}` | revision checked write, 409 on stale `_rev` |
//! | `POST /{db}/_purge` | removes matching revisions |
//! | `POST /{db}/_all_docs` | id-ordered rows, key list or start/end bounds |
//! | `POST /{db}/_design/{d}/_view/{field}` | rows keyed by `doc[field]` |
//! | `POST /{db}/_find` | top-level field selectors, sort, fields, bookmarks |
//!
//! Every request is recorded and can be inspected with [`MemoryCouch::requests`].

use crate::transport::{CouchTransport, HttpRequest, Method};
use async_trait::async_trait;
use divan_core::{is_design_doc_id, TransportError};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

/// Default `_find` page size when the request has no `limit`.
const DEFAULT_FIND_LIMIT: usize = 25;

#[derive(Debug, Clone)]
struct StoredDoc {
    generation: u64,
    rev: String,
    deleted: bool,
    fields: Map<String, Value>,
}

impl StoredDoc {
    fn to_json(&self, id: &str) -> Value {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), json!(id));
        doc.insert("_rev".to_string(), json!(self.rev));
        for (k, v) in &self.fields {
            doc.insert(k.clone(), v.clone());
        }
        Value::Object(doc)
    }
}

#[derive(Debug, Default)]
struct State {
    docs: BTreeMap<String, StoredDoc>,
    requests: Vec<HttpRequest>,
    failures: VecDeque<TransportError>,
    find_warning: Option<String>,
    revisions: u64,
}

/// In-memory CouchDB stand-in.
#[derive(Debug, Default)]
pub struct MemoryCouch {
    state: Mutex<State>,
}

fn status(status: u16, error: &str, reason: &str) -> TransportError {
    TransportError::Status {
        status,
        error: error.to_string(),
        reason: reason.to_string(),
    }
}

fn bad_request(reason: &str) -> TransportError {
    status(400, "bad_request", reason)
}

fn not_found() -> TransportError {
    status(404, "not_found", "missing")
}

fn decode_segment(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            if let Ok(byte) = u8::from_str_radix(&segment[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ============================================================================
// Collation
// ============================================================================

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// View key ordering: null < false < true < numbers < strings < arrays < objects.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = collate(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| collate(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

// ============================================================================
// Views
// ============================================================================

struct Row {
    id: String,
    key: Value,
    doc: Value,
}

struct Bounds<'a> {
    descending: bool,
    start: Option<(&'a Value, Option<&'a str>)>,
    end: Option<(&'a Value, Option<&'a str>)>,
    inclusive_end: bool,
}

impl Bounds<'_> {
    fn cmp(&self, row: &Row, key: &Value, docid: Option<&str>) -> Ordering {
        let ord = collate(&row.key, key).then_with(|| match docid {
            Some(d) => row.id.as_str().cmp(d),
            None => Ordering::Equal,
        });
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }

    fn after_start(&self, row: &Row) -> bool {
        match self.start {
            Some((key, docid)) => self.cmp(row, key, docid) != Ordering::Less,
            None => true,
        }
    }

    fn before_end(&self, row: &Row) -> bool {
        match self.end {
            Some((key, docid)) => match self.cmp(row, key, docid) {
                Ordering::Less => true,
                Ordering::Equal => self.inclusive_end,
                Ordering::Greater => false,
            },
            None => true,
        }
    }
}

fn body_bool(body: &Value, name: &str, default: bool) -> bool {
    body.get(name).and_then(Value::as_bool).unwrap_or(default)
}

fn body_usize(body: &Value, name: &str) -> Result<Option<usize>, TransportError> {
    match body.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| bad_request(&format!("invalid `{}`", name))),
    }
}

fn view_response(rows: Vec<Row>, body: &Value) -> Result<Value, TransportError> {
    let include_docs = body_bool(body, "include_docs", false);
    let descending = body_bool(body, "descending", false);
    let skip = body_usize(body, "skip")?.unwrap_or(0);
    let limit = body_usize(body, "limit")?;
    let total_rows = rows.len();

    let mut rows = rows;
    if descending {
        rows.reverse();
    }

    let key = body.get("key");
    let startkey = key.or_else(|| body.get("startkey"));
    let endkey = key.or_else(|| body.get("endkey"));
    let bounds = Bounds {
        descending,
        start: startkey.map(|k| (k, body.get("startkey_docid").and_then(Value::as_str))),
        end: endkey.map(|k| (k, body.get("endkey_docid").and_then(Value::as_str))),
        inclusive_end: key.is_some() || body_bool(body, "inclusive_end", true),
    };

    let offset = rows.iter().take_while(|r| !bounds.after_start(r)).count();
    let selected: Vec<Value> = rows
        .iter()
        .skip(offset)
        .take_while(|r| bounds.before_end(r))
        .skip(skip)
        .take(limit.unwrap_or(usize::MAX))
        .map(|r| {
            let mut row = json!({"id": r.id, "key": r.key, "value": null});
            if include_docs {
                row["doc"] = r.doc.clone();
            }
            row
        })
        .collect();

    Ok(json!({
        "total_rows": total_rows,
        "offset": offset + skip,
        "rows": selected,
    }))
}

// ============================================================================
// Mango
// ============================================================================

fn matches_condition(field: Option<&Value>, condition: &Value) -> bool {
    let ops = match condition {
        Value::Object(ops) if ops.keys().all(|k| k.starts_with('$')) && !ops.is_empty() => ops,
        literal => return field == Some(literal),
    };
    ops.iter().all(|(op, arg)| match (op.as_str(), field) {
        ("$exists", f) => arg.as_bool() == Some(f.is_some()),
        ("$eq", Some(f)) => f == arg,
        ("$ne", f) => f != Some(arg),
        ("$gt", Some(f)) => collate(f, arg) == Ordering::Greater,
        ("$gte", Some(f)) => collate(f, arg) != Ordering::Less,
        ("$lt", Some(f)) => collate(f, arg) == Ordering::Less,
        ("$lte", Some(f)) => collate(f, arg) != Ordering::Greater,
        ("$in", Some(f)) => arg.as_array().is_some_and(|a| a.contains(f)),
        _ => false,
    })
}

fn matches_selector(doc: &Value, selector: &Value) -> bool {
    let Some(selector) = selector.as_object() else {
        return false;
    };
    selector.iter().all(|(name, condition)| match name.as_str() {
        "$and" => condition
            .as_array()
            .is_some_and(|all| all.iter().all(|s| matches_selector(doc, s))),
        "$or" => condition
            .as_array()
            .is_some_and(|any| any.iter().any(|s| matches_selector(doc, s))),
        field => matches_condition(doc.get(field), condition),
    })
}

fn sort_fields(sort: &Value) -> Result<Vec<(String, bool)>, TransportError> {
    let Some(items) = sort.as_array() else {
        return Err(bad_request("`sort` must be an array"));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(field) => Ok((field.clone(), false)),
            Value::Object(map) if map.len() == 1 => {
                let (field, dir) = map.iter().next().ok_or_else(|| bad_request("empty sort"))?;
                Ok((field.clone(), dir.as_str() == Some("desc")))
            }
            _ => Err(bad_request("invalid sort item")),
        })
        .collect()
}

fn project(doc: &Value, fields: &[Value]) -> Value {
    let mut out = Map::new();
    for field in fields.iter().filter_map(Value::as_str) {
        if let Some(v) = doc.get(field) {
            out.insert(field.to_string(), v.clone());
        }
    }
    Value::Object(out)
}

impl MemoryCouch {
    /// Empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document without recording a request; returns its revision.
    ///
    /// # Panics
    ///
    /// Panics if `doc` is not an object with a string `_id`.
    pub fn seed(&self, doc: Value) -> String {
        let id = doc
            .get("_id")
            .and_then(Value::as_str)
            .expect("seed document needs an `_id`")
            .to_string();
        let mut state = self.state.lock();
        match Self::write(&mut state, &id, &doc) {
            Ok(response) => response["rev"].as_str().unwrap_or_default().to_string(),
            Err(e) => panic!("seed failed: {}", e),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of recorded requests whose path ends with `suffix`.
    pub fn request_count(&self, suffix: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.path.ends_with(suffix))
            .count()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Make the next request fail with the given status.
    pub fn fail_next(&self, status_code: u16, error: &str) {
        self.state
            .lock()
            .failures
            .push_back(status(status_code, error, "injected failure"));
    }

    /// Attach a `warning` to every `_find` response.
    pub fn set_find_warning(&self, warning: Option<&str>) {
        self.state.lock().find_warning = warning.map(str::to_string);
    }

    /// Live (non-deleted) documents, design documents included.
    pub fn document_count(&self) -> usize {
        self.state.lock().docs.values().filter(|d| !d.deleted).count()
    }

    fn write(state: &mut State, id: &str, body: &Value) -> Result<Value, TransportError> {
        let Some(object) = body.as_object() else {
            return Err(bad_request("Document must be a JSON object"));
        };
        let given_rev = object.get("_rev").and_then(Value::as_str);
        let deleted = object.get("_deleted").and_then(Value::as_bool).unwrap_or(false);

        let generation = match state.docs.get(id) {
            Some(existing) if !existing.deleted => {
                if given_rev != Some(existing.rev.as_str()) {
                    return Err(status(409, "conflict", "Document update conflict."));
                }
                existing.generation
            }
            Some(existing) => {
                if given_rev.is_some_and(|r| r != existing.rev) {
                    return Err(status(409, "conflict", "Document update conflict."));
                }
                existing.generation
            }
            None => {
                if given_rev.is_some() {
                    return Err(status(409, "conflict", "Document update conflict."));
                }
                0
            }
        } + 1;

        state.revisions += 1;
        let rev = format!(
            "{}-{:08x}",
            generation,
            state.revisions.wrapping_mul(2_654_435_761) & 0xffff_ffff
        );
        let fields = object
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "_id" | "_rev" | "_deleted"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        state.docs.insert(
            id.to_string(),
            StoredDoc {
                generation,
                rev: rev.clone(),
                deleted,
                fields,
            },
        );
        Ok(json!({"ok": true, "id": id, "rev": rev}))
    }

    fn purge(state: &mut State, body: &Value) -> Result<Value, TransportError> {
        let Some(request) = body.as_object() else {
            return Err(bad_request("purge body must be an object"));
        };
        let mut purged = Map::new();
        for (id, revs) in request {
            let revs: Vec<&str> = revs
                .as_array()
                .map(|a| a.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let hit = state
                .docs
                .get(id)
                .is_some_and(|d| revs.contains(&d.rev.as_str()));
            if hit {
                let removed = state.docs.remove(id).map(|d| d.rev);
                purged.insert(id.clone(), json!(removed.into_iter().collect::<Vec<_>>()));
            } else {
                purged.insert(id.clone(), json!([]));
            }
        }
        Ok(json!({"purge_seq": null, "purged": purged}))
    }

    fn all_docs(state: &State, body: &Value) -> Result<Value, TransportError> {
        if let Some(keys) = body.get("keys") {
            let Some(keys) = keys.as_array() else {
                return Err(bad_request("`keys` must be an array"));
            };
            let include_docs = body_bool(body, "include_docs", false);
            let skip = body_usize(body, "skip")?.unwrap_or(0);
            let limit = body_usize(body, "limit")?.unwrap_or(usize::MAX);
            let rows: Vec<Value> = keys
                .iter()
                .map(|key| match key.as_str().and_then(|id| state.docs.get(id).map(|d| (id, d))) {
                    Some((id, d)) if d.deleted => json!({
                        "id": id, "key": id,
                        "value": {"rev": d.rev, "deleted": true},
                        "doc": null,
                    }),
                    Some((id, d)) => {
                        let mut row = json!({"id": id, "key": id, "value": {"rev": d.rev}});
                        if include_docs {
                            row["doc"] = d.to_json(id);
                        }
                        row
                    }
                    None => json!({"key": key, "error": "not_found"}),
                })
                .skip(skip)
                .take(limit)
                .collect();
            return Ok(json!({"total_rows": state.docs.len(), "offset": null, "rows": rows}));
        }

        let rows = state
            .docs
            .iter()
            .filter(|(_, d)| !d.deleted)
            .map(|(id, d)| Row {
                id: id.clone(),
                key: json!(id),
                doc: d.to_json(id),
            })
            .collect();
        view_response(rows, body)
    }

    fn field_view(state: &State, field: &str, body: &Value) -> Result<Value, TransportError> {
        if body.get("keys").is_some() {
            let keys = body["keys"].as_array().cloned().unwrap_or_default();
            let include_docs = body_bool(body, "include_docs", false);
            let limit = body_usize(body, "limit")?.unwrap_or(usize::MAX);
            let mut rows = Vec::new();
            for key in &keys {
                for (id, d) in state.docs.iter().filter(|(id, d)| {
                    !d.deleted && !is_design_doc_id(id) && d.fields.get(field) == Some(key)
                }) {
                    let mut row = json!({"id": id, "key": key, "value": null});
                    if include_docs {
                        row["doc"] = d.to_json(id);
                    }
                    rows.push(row);
                }
            }
            rows.truncate(limit);
            return Ok(json!({"total_rows": rows.len(), "offset": 0, "rows": rows}));
        }

        let mut rows: Vec<Row> = state
            .docs
            .iter()
            .filter(|(id, d)| !d.deleted && !is_design_doc_id(id))
            .filter_map(|(id, d)| {
                d.fields.get(field).map(|key| Row {
                    id: id.clone(),
                    key: key.clone(),
                    doc: d.to_json(id),
                })
            })
            .collect();
        rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
        view_response(rows, body)
    }

    fn find(state: &State, body: &Value) -> Result<Value, TransportError> {
        let selector = body
            .get("selector")
            .filter(|s| s.is_object())
            .ok_or_else(|| bad_request("`selector` must be an object"))?;
        let limit = body_usize(body, "limit")?.unwrap_or(DEFAULT_FIND_LIMIT);
        let start = match body.get("bookmark").and_then(Value::as_str) {
            Some(bookmark) => bookmark
                .strip_prefix("pos-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| bad_request("invalid bookmark"))?,
            None => body_usize(body, "skip")?.unwrap_or(0),
        };

        let mut matched: Vec<Value> = state
            .docs
            .iter()
            .filter(|(id, d)| !d.deleted && !is_design_doc_id(id))
            .map(|(id, d)| d.to_json(id))
            .filter(|doc| matches_selector(doc, selector))
            .collect();

        if let Some(sort) = body.get("sort") {
            let fields = sort_fields(sort)?;
            matched.sort_by(|a, b| {
                fields
                    .iter()
                    .map(|(field, desc)| {
                        let ord = collate(
                            a.get(field).unwrap_or(&Value::Null),
                            b.get(field).unwrap_or(&Value::Null),
                        );
                        if *desc {
                            ord.reverse()
                        } else {
                            ord
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let page: Vec<Value> = matched.iter().skip(start).take(limit).cloned().collect();
        let next = start + page.len();
        let docs: Vec<Value> = match body.get("fields").and_then(Value::as_array) {
            Some(fields) => page.iter().map(|d| project(d, fields)).collect(),
            None => page,
        };

        let mut response = json!({"docs": docs, "bookmark": format!("pos-{}", next)});
        if let Some(warning) = &state.find_warning {
            response["warning"] = json!(warning);
        }
        Ok(response)
    }

    fn route(state: &mut State, request: &HttpRequest) -> Result<Value, TransportError> {
        let segments: Vec<String> = request
            .path
            .trim_matches('/')
            .split('/')
            .map(decode_segment)
            .collect();
        let body = request.body.clone().unwrap_or(Value::Null);
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();

        match (request.method, parts.as_slice()) {
            (Method::Get, [db]) => {
                let live = state.docs.values().filter(|d| !d.deleted).count();
                Ok(json!({
                    "db_name": db,
                    "doc_count": live,
                    "doc_del_count": state.docs.len() - live,
                }))
            }
            (Method::Post, [_, "_all_docs"]) => Self::all_docs(state, &body),
            (Method::Post, [_, "_find"]) => Self::find(state, &body),
            (Method::Post, [_, "_purge"]) => Self::purge(state, &body),
            (Method::Post, [_, "_design", _, "_view", field]) => {
                Self::field_view(state, field, &body)
            }
            (method, [_, rest @ ..]) if !rest.is_empty() => {
                let id = rest.join("/");
                match method {
                    Method::Get => state
                        .docs
                        .get(&id)
                        .filter(|d| !d.deleted)
                        .map(|d| d.to_json(&id))
                        .ok_or_else(not_found),
                    Method::Put => Self::write(state, &id, &body),
                    Method::Post => Err(status(405, "method_not_allowed", "Only GET,PUT allowed")),
                }
            }
            _ => Err(not_found()),
        }
    }
}

#[async_trait]
impl CouchTransport for MemoryCouch {
    async fn execute(&self, request: HttpRequest) -> Result<Value, TransportError> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if let Some(failure) = state.failures.pop_front() {
            return Err(failure);
        }
        Self::route(&mut state, &request)
    }
}
