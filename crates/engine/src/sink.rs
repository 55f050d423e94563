//! Advisory warning side channel
//!
//! `_find` responses may carry a `warning` (typically a missing index).
//! Warnings never fail a query; the cursor hands them to the store's
//! [`WarningSink`].

use parking_lot::Mutex;

/// Receives non-fatal advisories raised while paginating.
///
/// The trait is object-safe for use as `Arc<dyn WarningSink>`.
pub trait WarningSink: Send + Sync {
    /// Called once per page that carried a warning.
    fn warning(&self, database: &str, message: &str);
}

/// Default sink: emits a `tracing` warning event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarningSink;

impl WarningSink for TracingWarningSink {
    fn warning(&self, database: &str, message: &str) {
        tracing::warn!(target: "divan::mango", db = database, warning = message, "Query warning");
    }
}

/// Sink that keeps every warning in memory.
#[derive(Debug, Default)]
pub struct CollectingWarningSink {
    warnings: Mutex<Vec<String>>,
}

impl CollectingWarningSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Warnings received so far, oldest first
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

impl WarningSink for CollectingWarningSink {
    fn warning(&self, _database: &str, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}
