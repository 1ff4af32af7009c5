//! Run-scoped processing context
//!
//! A [`ProcessingContext`] is created once per traversal and handed to every
//! processor. It holds:
//!
//! - **buckets**: aggregation slots addressed by key paths, e.g.
//!   `["chars", "data/group1"]`
//! - **shared**: the same structure for cross-phase singletons
//! - **results**: the ordered result log
//! - **trace**: every processor call in the order it happened
//!
//! Nothing is scoped to a directory. A processor that wants per-directory
//! lifetime clears its bucket itself, typically in a post phase.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use uuid::Uuid;

mod record;
mod store;

pub use record::{ResultRecord, Status, TraceEntry};
pub use store::{Store, StoreError};

/// Rule configuration handed to processors as keyword-style parameters
pub type Config = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct ProcessingContext {
    run_id: Uuid,
    root: PathBuf,
    buckets: Store,
    shared: Store,
    results: Vec<ResultRecord>,
    trace: Vec<TraceEntry>,
}

impl ProcessingContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            root: root.into(),
            buckets: Store::new(),
            shared: Store::new(),
            results: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The run root this context belongs to
    pub fn root(&self) -> &Path {
        &self.root
    }

    // Buckets

    pub fn bucket<K: AsRef<str>>(&self, keys: &[K]) -> Option<&Value> {
        self.buckets.get(keys)
    }

    pub fn bucket_mut<K: AsRef<str>>(&mut self, keys: &[K]) -> Option<&mut Value> {
        self.buckets.get_mut(keys)
    }

    /// Read a bucket, creating it with `default` on a miss
    pub fn bucket_or_insert<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        default: Value,
    ) -> Result<&mut Value, StoreError> {
        self.buckets.get_or_insert(keys, default)
    }

    pub fn set_bucket<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        value: Value,
    ) -> Result<Option<Value>, StoreError> {
        self.buckets.set(keys, value)
    }

    pub fn remove_bucket<K: AsRef<str>>(&mut self, keys: &[K]) -> Option<Value> {
        self.buckets.remove(keys)
    }

    pub fn bucket_paths<K: AsRef<str>>(&self, prefix: &[K]) -> Vec<Vec<String>> {
        self.buckets.leaf_paths(prefix)
    }

    pub fn buckets(&self) -> &Store {
        &self.buckets
    }

    // Shared store

    pub fn shared<K: AsRef<str>>(&self, keys: &[K]) -> Option<&Value> {
        self.shared.get(keys)
    }

    pub fn shared_mut<K: AsRef<str>>(&mut self, keys: &[K]) -> Option<&mut Value> {
        self.shared.get_mut(keys)
    }

    pub fn shared_or_insert<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        default: Value,
    ) -> Result<&mut Value, StoreError> {
        self.shared.get_or_insert(keys, default)
    }

    pub fn set_shared<K: AsRef<str>>(
        &mut self,
        keys: &[K],
        value: Value,
    ) -> Result<Option<Value>, StoreError> {
        self.shared.set(keys, value)
    }

    pub fn remove_shared<K: AsRef<str>>(&mut self, keys: &[K]) -> Option<Value> {
        self.shared.remove(keys)
    }

    pub fn shared_store(&self) -> &Store {
        &self.shared
    }

    // Result log

    pub fn push_result(&mut self, record: ResultRecord) {
        self.results.push(record);
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    pub fn into_results(self) -> Vec<ResultRecord> {
        self.results
    }

    // Trace

    pub(crate) fn record_call(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Drop all run state but keep the identity of the run
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.shared.clear();
        self.results.clear();
        self.trace.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bucket_default_is_created_on_read_miss() {
        let mut ctx = ProcessingContext::new("/tmp/root");
        assert!(ctx.bucket(&["counts", "data"]).is_none());

        let value = ctx.bucket_or_insert(&["counts", "data"], json!(0)).unwrap();
        assert_eq!(*value, json!(0));

        // visible to later reads in the same run
        assert_eq!(ctx.bucket(&["counts", "data"]), Some(&json!(0)));
        assert_eq!(ctx.bucket_paths(&["counts"]), vec![vec!["counts", "data"]]);
    }

    #[test]
    fn test_shared_and_buckets_are_separate() {
        let mut ctx = ProcessingContext::new(".");
        ctx.set_shared(&["document"], json!("report.docx")).unwrap();
        assert!(ctx.bucket(&["document"]).is_none());
        assert_eq!(ctx.shared(&["document"]), Some(&json!("report.docx")));
        assert_eq!(ctx.remove_shared(&["document"]), Some(json!("report.docx")));
    }

    #[test]
    fn test_result_log_keeps_order_and_counts_errors() {
        let mut ctx = ProcessingContext::new(".");
        ctx.push_result(ResultRecord::ok("first"));
        ctx.push_result(ResultRecord::error("second"));
        ctx.push_result(ResultRecord::ok("first"));

        let messages: Vec<_> = ctx.results().iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "first"]);
        assert_eq!(ctx.error_count(), 1);

        ctx.clear();
        assert!(ctx.results().is_empty());
    }
}
