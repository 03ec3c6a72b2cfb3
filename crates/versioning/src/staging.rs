//! Staging area and commit protocol
//!
//! A staging area is an in-memory transaction scoped to one branch and the
//! head timestamp captured when it was opened. Changes are buffered in
//! three buckets keyed by object id; `commit` turns them into immutable
//! revisions and advances the branch head with an optimistic
//! compare-and-swap. Losing the race surfaces as `StaleBranch` and leaves
//! no trace — the caller reopens against the new head and re-stages.
//!
//! ## Commit sequence
//!
//! ```text
//! 1. run conflict processors over the diff (abort on any conflict)
//! 2. take the branch commit lock, re-check the head (else StaleBranch)
//! 3. allocate a commit timestamp strictly greater than the head
//! 4. batch-write superseded + new revisions + commit metadata
//!    (new revisions stay invisible: created > current head)
//! 5. CAS advance the branch head — the visibility point
//! 6. on CAS failure, roll the batch back and report the race
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use termstore_core::error::{Result, TermStoreError};
use termstore_core::path::BranchPath;
use termstore_core::traits::{DocumentStore, WriteBatch};
use termstore_core::types::{doc_types, Branch, CommitInfo, Revision, Timestamp};

use crate::VersioningContext;

/// Lifecycle of a staging area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingStatus {
    /// Accepting staged changes
    Open,
    /// Commit succeeded; the staging area cannot be reused
    Committed,
    /// Explicitly discarded
    Discarded,
}

/// An object changed in place: old revision plus replacement content
#[derive(Debug, Clone, PartialEq)]
pub struct ChangedEntry {
    /// Revision visible on the branch when the change was staged
    pub old: Revision,
    /// Replacement content
    pub new: Value,
}

/// The three staged-change buckets, keyed by object id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Objects created by this transaction
    pub added: BTreeMap<String, Value>,
    /// Objects changed, with old and new snapshots
    pub changed: BTreeMap<String, ChangedEntry>,
    /// Objects removed, with the old snapshot
    pub removed: BTreeMap<String, Revision>,
}

impl ChangeSet {
    /// Number of staged object ids
    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }

    /// True if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All staged object ids, sorted
    pub fn object_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .added
            .keys()
            .chain(self.changed.keys())
            .chain(self.removed.keys())
            .cloned()
            .collect();
        ids.sort_unstable();
        ids
    }

    fn contains(&self, object_id: &str) -> bool {
        self.added.contains_key(object_id)
            || self.changed.contains_key(object_id)
            || self.removed.contains_key(object_id)
    }
}

/// In-memory transaction buffering pending changes against one branch head
///
/// Not safe for concurrent staging calls from multiple callers on the same
/// instance (`&mut self` enforces this at compile time); different staging
/// areas may run concurrently and race at commit.
pub struct StagingArea {
    id: Uuid,
    ctx: Arc<VersioningContext>,
    branch: Branch,
    changes: ChangeSet,
    status: StagingStatus,
}

impl StagingArea {
    /// Open a transaction against the branch's current head
    ///
    /// # Errors
    ///
    /// `NotFound` if the branch is missing, `Invalid` if it is deleted.
    pub fn open(ctx: Arc<VersioningContext>, branch_path: &BranchPath) -> Result<Self> {
        let branch = ctx.registry.get_branch(branch_path)?;
        if branch.state.is_deleted() {
            return Err(TermStoreError::invalid(format!(
                "branch {branch_path} is deleted"
            )));
        }
        Ok(StagingArea {
            id: Uuid::new_v4(),
            ctx,
            branch,
            changes: ChangeSet::default(),
            status: StagingStatus::Open,
        })
    }

    /// Transaction id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Branch snapshot the transaction was opened against
    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    /// Head timestamp captured at open (the transaction base)
    pub fn base_timestamp(&self) -> Timestamp {
        self.branch.head_timestamp
    }

    /// Current lifecycle state
    pub fn status(&self) -> StagingStatus {
        self.status
    }

    /// Shared context (conflict processors use this for index reads)
    pub fn context(&self) -> &VersioningContext {
        &self.ctx
    }

    /// The staged buckets; no side effects
    pub fn diff(&self) -> &ChangeSet {
        &self.changes
    }

    /// True if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.status != StagingStatus::Open {
            return Err(TermStoreError::invalid(format!(
                "staging area {} is {:?}, not open",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Current revision of an object as seen from the transaction base
    fn current(&self, object_id: &str) -> Result<Option<Revision>> {
        self.ctx
            .index
            .read_on(&self.branch, object_id, self.base_timestamp())
    }

    /// Stage the creation of a new object
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if the object is visible on the branch or already
    /// staged.
    pub fn stage_add(&mut self, object_id: &str, content: Value) -> Result<()> {
        self.ensure_open()?;
        if self.changes.contains(object_id) {
            return Err(TermStoreError::already_exists(format!(
                "object {object_id} is already staged"
            )));
        }
        if self.current(object_id)?.is_some() {
            return Err(TermStoreError::already_exists(format!(
                "object {object_id} on branch {}",
                self.branch.path
            )));
        }
        self.changes.added.insert(object_id.to_string(), content);
        Ok(())
    }

    /// Stage new content for an existing object
    ///
    /// Re-staging a change updates the pending content; changing an object
    /// staged as added updates the pending add.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object does not currently exist on the branch.
    pub fn stage_change(&mut self, object_id: &str, new_content: Value) -> Result<()> {
        self.ensure_open()?;
        if self.changes.removed.contains_key(object_id) {
            return Err(TermStoreError::invalid(format!(
                "object {object_id} is staged for removal"
            )));
        }
        if let Some(pending) = self.changes.added.get_mut(object_id) {
            *pending = new_content;
            return Ok(());
        }
        if let Some(entry) = self.changes.changed.get_mut(object_id) {
            entry.new = new_content;
            return Ok(());
        }
        let old = self.current(object_id)?.ok_or_else(|| {
            TermStoreError::not_found(format!(
                "object {object_id} on branch {}",
                self.branch.path
            ))
        })?;
        self.changes
            .changed
            .insert(object_id.to_string(), ChangedEntry { old, new: new_content });
        Ok(())
    }

    /// Stage the removal of an existing object
    ///
    /// Removing an object staged as added simply unstages it.
    ///
    /// # Errors
    ///
    /// `NotFound` if the object does not currently exist on the branch.
    pub fn stage_remove(&mut self, object_id: &str) -> Result<()> {
        self.ensure_open()?;
        if self.changes.added.remove(object_id).is_some() {
            return Ok(());
        }
        if self.changes.removed.contains_key(object_id) {
            return Ok(());
        }
        let old = match self.changes.changed.remove(object_id) {
            Some(entry) => entry.old,
            None => self.current(object_id)?.ok_or_else(|| {
                TermStoreError::not_found(format!(
                    "object {object_id} on branch {}",
                    self.branch.path
                ))
            })?,
        };
        self.changes.removed.insert(object_id.to_string(), old);
        Ok(())
    }

    /// Drop the transaction without committing
    pub fn discard(&mut self) {
        self.changes = ChangeSet::default();
        self.status = StagingStatus::Discarded;
    }

    /// Commit the staged changes atomically
    ///
    /// # Errors
    ///
    /// `MergeConflict` if a conflict processor rejects the diff,
    /// `StaleBranch` if another commit advanced the head first (retryable),
    /// `Invalid` for empty or oversized transactions, `Storage` on backend
    /// failure (nothing applied).
    pub fn commit(&mut self, author: &str, message: &str) -> Result<CommitInfo> {
        self.ensure_open()?;
        if self.changes.is_empty() {
            return Err(TermStoreError::invalid("nothing staged to commit"));
        }
        if self.changes.len() > self.ctx.config.max_staged_changes {
            return Err(TermStoreError::invalid(format!(
                "transaction touches {} objects, limit is {}",
                self.changes.len(),
                self.ctx.config.max_staged_changes
            )));
        }

        let mut conflicts = Vec::new();
        for processor in &self.ctx.processors {
            conflicts.extend(processor.process(self)?);
        }
        if !conflicts.is_empty() {
            tracing::warn!(
                branch = %self.branch.path,
                count = conflicts.len(),
                "commit rejected by conflict processors"
            );
            return Err(TermStoreError::MergeConflict(conflicts));
        }

        let path = self.branch.path.clone();
        let base = self.base_timestamp();

        // Serialize the apply+CAS window per branch so concurrent commits
        // cannot interleave storage writes for the same revisions.
        let lock = self.ctx.registry.commit_lock(&path);
        let _guard = lock.lock();

        let current = self.ctx.registry.get_branch(&path)?;
        if current.state.is_deleted() {
            return Err(TermStoreError::invalid(format!("branch {path} is deleted")));
        }
        if current.head_timestamp != base {
            return Err(TermStoreError::StaleBranch {
                path: path.as_str().to_string(),
                expected: base,
                actual: current.head_timestamp,
            });
        }

        let ts = self.ctx.clock.next_after(base);
        let (batch, undo, info) = self.build_batch(ts, author, message)?;

        self.ctx.store.apply(batch)?;
        if let Err(race) = self.ctx.registry.advance_head(&path, base, ts) {
            if let Err(rollback) = self.ctx.store.apply(undo) {
                tracing::error!(
                    branch = %path,
                    commit_timestamp = ts,
                    error = %rollback,
                    "rollback after lost commit race failed - orphaned revisions remain invisible"
                );
            }
            return Err(race);
        }

        self.status = StagingStatus::Committed;
        tracing::info!(
            branch = %path,
            commit_timestamp = ts,
            objects = info.object_ids.len(),
            author,
            "committed"
        );
        Ok(info)
    }

    /// Build the commit batch, its inverse, and the commit metadata
    fn build_batch(
        &self,
        ts: Timestamp,
        author: &str,
        message: &str,
    ) -> Result<(WriteBatch, WriteBatch, CommitInfo)> {
        let mut batch = WriteBatch::new();
        let mut undo = WriteBatch::new();
        let path = &self.branch.path;

        let supersede = |batch: &mut WriteBatch, undo: &mut WriteBatch, old: &Revision| -> Result<()> {
            // Only a revision on this same branch is superseded; a revision
            // inherited from an ancestor stays current there and is merely
            // shadowed here.
            if old.branch_path == *path {
                let mut replaced = old.clone();
                replaced.replaced_timestamp = Some(ts);
                batch.put(
                    doc_types::REVISION,
                    replaced.storage_id(),
                    serde_json::to_value(&replaced)?,
                );
                undo.put(
                    doc_types::REVISION,
                    old.storage_id(),
                    serde_json::to_value(old)?,
                );
            }
            Ok(())
        };

        let write_new = |batch: &mut WriteBatch,
                         undo: &mut WriteBatch,
                         revision: &Revision|
         -> Result<()> {
            batch.put(
                doc_types::REVISION,
                revision.storage_id(),
                serde_json::to_value(revision)?,
            );
            undo.remove(doc_types::REVISION, revision.storage_id());
            Ok(())
        };

        for (object_id, content) in &self.changes.added {
            // A prior tombstone on this branch is superseded and continues
            // the version counter.
            let prior = self.ctx.index.resolve(&self.branch, object_id, self.base_timestamp())?;
            if let Some(prior) = &prior {
                supersede(&mut batch, &mut undo, prior)?;
            }
            let revision = Revision {
                object_id: object_id.clone(),
                branch_path: path.clone(),
                created_timestamp: ts,
                replaced_timestamp: None,
                revision_version: prior.map_or(1, |p| p.revision_version + 1),
                deleted: false,
                content: content.clone(),
            };
            write_new(&mut batch, &mut undo, &revision)?;
        }

        for (object_id, entry) in &self.changes.changed {
            supersede(&mut batch, &mut undo, &entry.old)?;
            let revision = Revision {
                object_id: object_id.clone(),
                branch_path: path.clone(),
                created_timestamp: ts,
                replaced_timestamp: None,
                revision_version: entry.old.revision_version + 1,
                deleted: false,
                content: entry.new.clone(),
            };
            write_new(&mut batch, &mut undo, &revision)?;
        }

        for (object_id, old) in &self.changes.removed {
            supersede(&mut batch, &mut undo, old)?;
            let tombstone = Revision {
                object_id: object_id.clone(),
                branch_path: path.clone(),
                created_timestamp: ts,
                replaced_timestamp: None,
                revision_version: old.revision_version + 1,
                deleted: true,
                content: Value::Null,
            };
            write_new(&mut batch, &mut undo, &tombstone)?;
        }

        let info = CommitInfo {
            timestamp: ts,
            branch_path: path.clone(),
            author: author.to_string(),
            message: message.to_string(),
            object_ids: self.changes.object_ids(),
            written_at: chrono::Utc::now(),
        };
        batch.put(
            doc_types::COMMIT,
            info.storage_id(),
            serde_json::to_value(&info)?,
        );
        undo.remove(doc_types::COMMIT, info.storage_id());

        Ok((batch, undo, info))
    }
}
