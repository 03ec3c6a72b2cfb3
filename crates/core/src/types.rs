//! Branch, revision, conflict and commit value types
//!
//! All timestamps are logical commit timestamps: `u64` microseconds allocated
//! by the commit clock, strictly increasing per branch head. Branch and
//! revision values are immutable snapshots; mutation happens only through the
//! registry and the staging commit protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::BranchPath;

/// Logical commit timestamp (microseconds)
pub type Timestamp = u64;

/// Reserved document types under which the engine persists its own state
pub mod doc_types {
    /// Branch documents, keyed by branch path
    pub const BRANCH: &str = "branch";
    /// Revision documents, keyed by `object_id|branch_path|created_timestamp`
    pub const REVISION: &str = "revision";
    /// Commit metadata documents, keyed by `branch_path|timestamp`
    pub const COMMIT: &str = "commit";

    /// True if `doc_type` is reserved for engine state
    pub fn is_reserved(doc_type: &str) -> bool {
        matches!(doc_type, BRANCH | REVISION | COMMIT)
    }
}

/// Branch lifecycle state
///
/// `Active` and `Deleted` are stored; `Stale` is computed when a branch is
/// loaded (an active branch whose parent head moved past its fork point), so
/// it can never go out of date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchState {
    /// Branch accepts commits
    Active,
    /// Parent has commits this branch has not rebased onto
    Stale,
    /// Branch is logically removed; operations on it fail
    Deleted,
}

impl BranchState {
    /// True if the branch accepts commits (Active or Stale)
    pub fn is_writable(&self) -> bool {
        !matches!(self, BranchState::Deleted)
    }

    /// True if the branch is logically removed
    pub fn is_deleted(&self) -> bool {
        matches!(self, BranchState::Deleted)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchState::Active => "Active",
            BranchState::Stale => "Stale",
            BranchState::Deleted => "Deleted",
        }
    }
}

impl std::fmt::Display for BranchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One level of a branch's ancestry with its visibility cap
///
/// For the branch itself the cap is `Timestamp::MAX` (bounded by the read's
/// `as_of`); for each ancestor the cap is the minimum of the child caps and
/// the child's fork point, precomputed so MVCC reads walk a flat array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestrySegment {
    /// Branch contributing revisions at this level
    pub path: BranchPath,
    /// Highest commit timestamp on `path` visible through this segment
    pub cap: Timestamp,
}

impl AncestrySegment {
    /// Effective cap for a read at `as_of`
    pub fn cap_at(&self, as_of: Timestamp) -> Timestamp {
        self.cap.min(as_of)
    }
}

/// Immutable snapshot of a branch
///
/// Returned by the registry; never observed half-updated. `ancestry` is the
/// precomputed resolution chain from this branch up to the root, rebuilt when
/// the branch is created or rebased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Unique hierarchical name, also the branch identity
    pub path: BranchPath,
    /// Parent path; None only for the root branch
    pub parent_path: Option<BranchPath>,
    /// Parent head at the moment this branch was created (fork point)
    pub base_timestamp: Timestamp,
    /// Latest commit made directly on this branch
    pub head_timestamp: Timestamp,
    /// Lifecycle state (Stale computed at load)
    pub state: BranchState,
    /// Resolution chain, self first, root last
    #[serde(skip)]
    pub ancestry: Vec<AncestrySegment>,
}

impl Branch {
    /// Ancestry segments with caps bounded by `as_of`
    pub fn segments_at(&self, as_of: Timestamp) -> impl Iterator<Item = (&BranchPath, Timestamp)> {
        self.ancestry.iter().map(move |s| (&s.path, s.cap_at(as_of)))
    }

    /// True if this branch may be read from / written to
    pub fn is_writable(&self) -> bool {
        self.state.is_writable()
    }
}

/// Immutable snapshot of one logical object at one point in branch history
///
/// Append-only: a delete writes a tombstone revision (`deleted = true`),
/// never a physical removal. `replaced_timestamp` is set only by a later
/// commit on the same branch that supersedes this revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Stable logical identity of the versioned object
    pub object_id: String,
    /// Branch on which this revision was created
    pub branch_path: BranchPath,
    /// Commit time at which the revision became visible
    pub created_timestamp: Timestamp,
    /// Commit time at which a newer revision superseded this one on the
    /// same branch (None = still current there)
    pub replaced_timestamp: Option<Timestamp>,
    /// Monotonically increasing counter per object id
    pub revision_version: u64,
    /// Tombstone marker
    pub deleted: bool,
    /// Opaque document payload
    pub content: Value,
}

impl Revision {
    /// Storage id under the reserved `"revision"` document type
    pub fn storage_id(&self) -> String {
        Self::make_storage_id(&self.object_id, &self.branch_path, self.created_timestamp)
    }

    /// Build the natural unique key `object_id|branch_path|created_timestamp`
    pub fn make_storage_id(object_id: &str, branch_path: &BranchPath, created: Timestamp) -> String {
        format!("{object_id}|{branch_path}|{created}")
    }

    /// True if this revision is the visible one at `cap` on its own branch
    pub fn visible_at(&self, cap: Timestamp) -> bool {
        self.created_timestamp <= cap
            && self.replaced_timestamp.map_or(true, |replaced| replaced > cap)
    }

    /// True if both revisions carry the same logical state
    ///
    /// Tombstones compare equal to each other regardless of prior content;
    /// live revisions compare by content. Used by the merge engine to detect
    /// convergent edits.
    pub fn same_state(&self, other: &Revision) -> bool {
        if self.deleted || other.deleted {
            self.deleted == other.deleted
        } else {
            self.content == other.content
        }
    }

    /// True if this is the identical stored revision (same branch + commit)
    pub fn same_revision(&self, other: &Revision) -> bool {
        self.object_id == other.object_id
            && self.branch_path == other.branch_path
            && self.created_timestamp == other.created_timestamp
    }
}

/// Merge conflict taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// Both sides added the same object id independently
    AddedAdded,
    /// Both sides changed the object with diverging content
    ChangedChanged,
    /// One side deleted the object the other side changed
    DeletedWhileChanged,
    /// A staged document references an object absent from the resulting
    /// snapshot (reported by the reference-integrity processor)
    MissingReference,
}

impl ConflictKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::AddedAdded => "ADDED_ADDED",
            ConflictKind::ChangedChanged => "CHANGED_CHANGED",
            ConflictKind::DeletedWhileChanged => "DELETED_WHILE_CHANGED",
            ConflictKind::MissingReference => "MISSING_REFERENCE",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structural or domain conflict found during merge preparation
///
/// Returned to the caller inside `TermStoreError::MergeConflict`; never
/// stored long-term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Object the conflict is about
    pub object_id: String,
    /// Conflict classification
    pub kind: ConflictKind,
    /// Revision on the source side, if one is involved
    pub source_revision: Option<Revision>,
    /// Revision on the target side, if one is involved
    pub target_revision: Option<Revision>,
    /// Human-readable description
    pub message: String,
}

impl Conflict {
    /// Conflict without revision references
    pub fn new(object_id: impl Into<String>, kind: ConflictKind, message: impl Into<String>) -> Self {
        Conflict {
            object_id: object_id.into(),
            kind,
            source_revision: None,
            target_revision: None,
            message: message.into(),
        }
    }

    /// Attach the source-side revision
    pub fn with_source(mut self, revision: Revision) -> Self {
        self.source_revision = Some(revision);
        self
    }

    /// Attach the target-side revision
    pub fn with_target(mut self, revision: Revision) -> Self {
        self.target_revision = Some(revision);
        self
    }
}

/// Metadata recorded for every successful commit, merge and rebase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Logical commit timestamp (the branch head after this commit)
    pub timestamp: Timestamp,
    /// Branch the commit landed on
    pub branch_path: BranchPath,
    /// Author supplied by the caller
    pub author: String,
    /// Commit message supplied by the caller
    pub message: String,
    /// Object ids touched by the commit
    pub object_ids: Vec<String>,
    /// Wall-clock time the commit was written
    pub written_at: DateTime<Utc>,
}

impl CommitInfo {
    /// Storage id under the reserved `"commit"` document type
    pub fn storage_id(&self) -> String {
        format!("{}|{}", self.branch_path, self.timestamp)
    }
}
