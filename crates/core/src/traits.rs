//! Document store abstraction
//!
//! The versioning engine treats the physical index as a black box keyed by
//! `(doc_type, id)`. Any backend that can get/put/remove documents, apply a
//! multi-document batch atomically, and answer field-match queries can sit
//! below the engine. The reference implementation lives in
//! `termstore-storage`.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync).

use serde_json::Value;

use crate::error::Result;
use crate::query::Query;

/// One operation inside a write batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Insert or overwrite a document
    Put {
        /// Document type
        doc_type: String,
        /// Document id, unique within the type
        id: String,
        /// Document body
        document: Value,
    },
    /// Remove a document (no-op if absent)
    Remove {
        /// Document type
        doc_type: String,
        /// Document id
        id: String,
    },
}

/// Ordered set of writes applied all-or-nothing
///
/// The commit protocol depends on batch atomicity: a reader must never
/// observe a prefix of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Empty batch
    pub fn new() -> Self {
        WriteBatch::default()
    }

    /// Queue a put
    pub fn put(&mut self, doc_type: impl Into<String>, id: impl Into<String>, document: Value) {
        self.ops.push(BatchOp::Put {
            doc_type: doc_type.into(),
            id: id.into(),
            document,
        });
    }

    /// Queue a remove
    pub fn remove(&mut self, doc_type: impl Into<String>, id: impl Into<String>) {
        self.ops.push(BatchOp::Remove {
            doc_type: doc_type.into(),
            id: id.into(),
        });
    }

    /// Operations in insertion order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Physical document index: get/put/remove/search over opaque typed documents
///
/// No branching awareness; the revision index layers branch and time
/// filtering on top. Implementations must provide atomic `apply` — either
/// every operation in the batch becomes visible or none do.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, None if absent
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, doc_type: &str, id: &str) -> Result<Option<Value>>;

    /// Insert or overwrite a single document
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put(&self, doc_type: &str, id: &str, document: Value) -> Result<()>;

    /// Remove a single document, returning the previous body if any
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn remove(&self, doc_type: &str, id: &str) -> Result<Option<Value>>;

    /// Apply a multi-document batch atomically (all-or-nothing)
    ///
    /// # Errors
    ///
    /// Returns an error if the batch cannot be applied; in that case no
    /// operation from the batch may be visible.
    fn apply(&self, batch: WriteBatch) -> Result<()>;

    /// Ids of documents of `doc_type` matching `query`
    ///
    /// No ordering guarantee beyond determinism for an unchanged store.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn search(&self, doc_type: &str, query: &Query) -> Result<Vec<String>>;
}
