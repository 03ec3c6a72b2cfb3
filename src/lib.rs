//! Branching, revision-controlled document store for terminology content
//!
//! Documents live on branches arranged in a tree rooted at `MAIN`. A branch
//! forks from its parent at a fork point and sees the parent's content as of
//! that moment; its own commits shadow inherited content without touching
//! the parent. Writes go through a staging area and land as immutable
//! revisions under an optimistic head check, so concurrent writers to the
//! same branch race safely. Branches flow back together with three-way
//! merge, or catch up with their parent by rebasing, with a conflict
//! taxonomy covering double adds, diverging changes, deletes of changed
//! objects and dangling references.
//!
//! ```
//! use serde_json::json;
//! use termstore::{BranchPath, Query, TermStore};
//!
//! # fn main() -> termstore::Result<()> {
//! let store = TermStore::in_memory()?;
//! let main = BranchPath::root();
//!
//! let mut staging = store.open_staging(&main)?;
//! staging.stage_add("concept-1", json!({"label": "Sepsis", "status": "active"}))?;
//! staging.commit("alice", "initial import")?;
//!
//! // Work on a branch without disturbing MAIN, then merge back
//! let review = store.create_branch(&main, "review")?;
//! let mut staging = store.open_staging(&review.path)?;
//! staging.stage_change("concept-1", json!({"label": "Sepsis (disorder)", "status": "active"}))?;
//! staging.commit("alice", "refine label")?;
//! let merged = store.merge(&review.path, &main, "alice", "apply review")?;
//! assert!(merged.is_some());
//!
//! let found = store.get_object(&main, "concept-1")?.unwrap();
//! assert_eq!(found.content["label"], "Sepsis (disorder)");
//! # Ok(())
//! # }
//! ```

mod store;

pub use store::TermStore;

pub use termstore_core::{
    doc_types, BatchOp, Branch, BranchPath, BranchState, CommitInfo, Conflict, ConflictKind,
    DocumentStore, Query, Result, Revision, Term, TermStoreError, Timestamp, VersioningConfig,
    WriteBatch,
};
pub use termstore_storage::{FaultingStore, MemoryStore};
pub use termstore_versioning::{
    ChangeSet, ChangedEntry, ConflictProcessor, MergeEngine, ReferenceIntegrityProcessor,
    StagingArea, StagingStatus, VersioningContext,
};
