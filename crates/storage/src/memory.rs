//! In-memory document store
//!
//! A single `parking_lot::RwLock` over a `BTreeMap` keyed by
//! `(doc_type, id)`. Batch application holds the write lock for the whole
//! batch, which gives the all-or-nothing visibility the commit protocol
//! relies on. Reads take the shared lock and clone the document out, so no
//! caller ever observes a torn value.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

use termstore_core::error::Result;
use termstore_core::query::Query;
use termstore_core::traits::{BatchOp, DocumentStore, WriteBatch};

/// In-memory `DocumentStore` backed by a locked `BTreeMap`
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<(String, String), Value>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Total number of documents across all types
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Number of documents of one type
    pub fn count(&self, doc_type: &str) -> usize {
        self.data
            .read()
            .keys()
            .filter(|(t, _)| t == doc_type)
            .count()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, doc_type: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .data
            .read()
            .get(&(doc_type.to_string(), id.to_string()))
            .cloned())
    }

    fn put(&self, doc_type: &str, id: &str, document: Value) -> Result<()> {
        self.data
            .write()
            .insert((doc_type.to_string(), id.to_string()), document);
        Ok(())
    }

    fn remove(&self, doc_type: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .data
            .write()
            .remove(&(doc_type.to_string(), id.to_string())))
    }

    fn apply(&self, batch: WriteBatch) -> Result<()> {
        // One write-lock scope = atomic visibility for the whole batch.
        let mut data = self.data.write();
        for op in batch.ops() {
            match op {
                BatchOp::Put {
                    doc_type,
                    id,
                    document,
                } => {
                    data.insert((doc_type.clone(), id.clone()), document.clone());
                }
                BatchOp::Remove { doc_type, id } => {
                    data.remove(&(doc_type.clone(), id.clone()));
                }
            }
        }
        Ok(())
    }

    fn search(&self, doc_type: &str, query: &Query) -> Result<Vec<String>> {
        Ok(self
            .data
            .read()
            .iter()
            .filter(|((t, _), doc)| t == doc_type && query.matches(doc))
            .map(|((_, id), _)| id.clone())
            .collect())
    }
}
