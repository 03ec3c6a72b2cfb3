//! Core types for the termstore versioning engine
//!
//! This crate holds the shared vocabulary of the system: branch and revision
//! value types, the error taxonomy, the query model, and the `DocumentStore`
//! trait through which the engine talks to the physical document index.
//! It performs no I/O of its own.

pub mod error;
pub mod limits;
pub mod path;
pub mod query;
pub mod traits;
pub mod types;

pub use error::{Result, TermStoreError};
pub use limits::VersioningConfig;
pub use path::BranchPath;
pub use query::{Query, Term};
pub use traits::{BatchOp, DocumentStore, WriteBatch};
pub use types::{
    doc_types, AncestrySegment, Branch, BranchState, CommitInfo, Conflict, ConflictKind,
    Revision, Timestamp,
};
