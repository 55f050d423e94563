//! Shared test utilities for the engine integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use divan_engine::{CollectingWarningSink, CouchStore};
use divan_gateway::MemoryCouch;
use serde_json::json;
use std::sync::{Arc, Once};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route library logs to the test harness output.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TestStore - store over an in-memory database
// ============================================================================

/// Store, its backing database and the sink receiving `_find` warnings.
pub struct TestStore {
    pub couch: Arc<MemoryCouch>,
    pub store: CouchStore,
    pub sink: Arc<CollectingWarningSink>,
}

impl TestStore {
    pub fn new() -> Self {
        init_tracing();
        let couch = Arc::new(MemoryCouch::new());
        let sink = Arc::new(CollectingWarningSink::new());
        let store = CouchStore::new("app", couch.clone()).with_warning_sink(sink.clone());
        TestStore { couch, store, sink }
    }

    /// Seed `count` documents `doc-000..` with a `group` field cycling over
    /// `groups` values.
    pub fn with_docs(count: usize, groups: usize) -> Self {
        let t = Self::new();
        for i in 0..count {
            t.couch.seed(json!({
                "_id": format!("doc-{:03}", i),
                "n": i,
                "group": format!("g{}", i % groups.max(1)),
            }));
        }
        t
    }

    pub fn seed_design_doc(&self) {
        self.couch
            .seed(json!({"_id": "_design/by", "views": {"group": {"map": "function(doc) {}"}}}));
    }
}

/// `ceil(a / b)`
pub fn div_ceil(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}
