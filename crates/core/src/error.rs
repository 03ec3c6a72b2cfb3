//! Error types for the versioning engine
//!
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations. `StaleBranch` is the only retryable variant: the caller
//! reopens a staging area against the new head and re-stages.

use crate::types::Conflict;
use thiserror::Error;

/// Result type alias for termstore operations
pub type Result<T> = std::result::Result<T, TermStoreError>;

/// Error taxonomy for the versioning engine
#[derive(Debug, Error)]
pub enum TermStoreError {
    /// Branch or object absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Branch name collision on create
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Lost the optimistic race on a head advance (CAS mismatch)
    ///
    /// Retryable: reopen the staging area against the new head and re-stage.
    #[error("stale head on branch {path}: expected {expected}, found {actual}")]
    StaleBranch {
        /// Branch whose head moved
        path: String,
        /// Head timestamp the caller staged against
        expected: u64,
        /// Head timestamp actually stored
        actual: u64,
    },

    /// Merge or commit rejected with a structured conflict list
    ///
    /// Not retryable without new input; the caller resolves the conflicts
    /// (or picks a different target) and runs the operation again.
    #[error("merge rejected: {} conflict(s)", .0.len())]
    MergeConflict(Vec<Conflict>),

    /// Branch deletion blocked by a child that still carries unmerged
    /// commits
    ///
    /// Distinct from `Invalid` so API layers can report it as a conflict
    /// with current state rather than a malformed request. Merge or delete
    /// the named child first.
    #[error("branch {path} has unmerged child {child}")]
    UnmergedChild {
        /// Branch the caller tried to delete
        path: String,
        /// Child still holding its own commits
        child: String,
    },

    /// Operation on a deleted branch, or otherwise invalid state
    #[error("invalid operation: {0}")]
    Invalid(String),

    /// Document store failure (fatal passthrough)
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization of a persisted document failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TermStoreError {
    /// Branch-or-object-not-found with a formatted message
    pub fn not_found(what: impl Into<String>) -> Self {
        TermStoreError::NotFound(what.into())
    }

    /// Name-collision error
    pub fn already_exists(what: impl Into<String>) -> Self {
        TermStoreError::AlreadyExists(what.into())
    }

    /// Invalid-operation error
    pub fn invalid(msg: impl Into<String>) -> Self {
        TermStoreError::Invalid(msg.into())
    }

    /// Storage-layer error
    pub fn storage(msg: impl Into<String>) -> Self {
        TermStoreError::Storage(msg.into())
    }

    /// True only for errors the caller may retry after reloading state
    pub fn is_retryable(&self) -> bool {
        matches!(self, TermStoreError::StaleBranch { .. })
    }

    /// Conflicts carried by a `MergeConflict`, empty slice otherwise
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            TermStoreError::MergeConflict(conflicts) => conflicts,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for TermStoreError {
    fn from(e: serde_json::Error) -> Self {
        TermStoreError::Serialization(e.to_string())
    }
}
