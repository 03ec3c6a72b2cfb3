//! Instrumented store wrappers for failure injection
//!
//! Used by the atomicity test suites: a `FaultingStore` delegates to an
//! inner store but can be armed to reject the next batch, simulating a
//! storage backend failure mid-commit. Rejection happens before any
//! operation is applied, matching the atomic-batch contract.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use termstore_core::error::{Result, TermStoreError};
use termstore_core::query::Query;
use termstore_core::traits::{DocumentStore, WriteBatch};

/// Store wrapper that can be armed to fail batch application
pub struct FaultingStore {
    inner: Arc<dyn DocumentStore>,
    fail_next_apply: AtomicBool,
    applies: AtomicUsize,
}

impl FaultingStore {
    /// Wrap an inner store
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        FaultingStore {
            inner,
            fail_next_apply: AtomicBool::new(false),
            applies: AtomicUsize::new(0),
        }
    }

    /// Make the next `apply` call fail without touching the inner store
    pub fn fail_next_apply(&self) {
        self.fail_next_apply.store(true, Ordering::SeqCst);
    }

    /// Number of batches successfully applied
    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

impl DocumentStore for FaultingStore {
    fn get(&self, doc_type: &str, id: &str) -> Result<Option<Value>> {
        self.inner.get(doc_type, id)
    }

    fn put(&self, doc_type: &str, id: &str, document: Value) -> Result<()> {
        self.inner.put(doc_type, id, document)
    }

    fn remove(&self, doc_type: &str, id: &str) -> Result<Option<Value>> {
        self.inner.remove(doc_type, id)
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(TermStoreError::storage(
                "injected failure: batch rejected".to_string(),
            ));
        }
        self.inner.apply(batch)?;
        self.applies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn search(&self, doc_type: &str, query: &Query) -> Result<Vec<String>> {
        self.inner.search(doc_type, query)
    }
}
