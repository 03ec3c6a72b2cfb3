//! Three-way merge and rebase between parent and child branches
//!
//! Both operations share one classifier: resolve each object's state on the
//! source head, the target head and the common ancestor, then decide per
//! object whether the change flows, is a convergent no-op, or conflicts.
//! Merge applies the flowing changes to the target through a regular staging
//! commit; rebase applies nothing and instead moves the child's fork point
//! to the parent's head, letting the widened visibility window carry the
//! parent's changes in.
//!
//! The ancestor state is always resolved on the PARENT branch at the child's
//! current fork point. The child's own revisions keep their original
//! `created_timestamp` across rebases, so neither the candidate set nor the
//! base may be derived from timestamp comparisons against the (movable)
//! fork point: classification is by state, and the child's candidate set is
//! every object it ever touched directly.

use std::collections::BTreeSet;
use std::sync::Arc;

use termstore_core::error::{Result, TermStoreError};
use termstore_core::path::BranchPath;
use termstore_core::traits::DocumentStore;
use termstore_core::types::{
    doc_types, Branch, CommitInfo, Conflict, ConflictKind, Revision, Timestamp,
};

use crate::staging::StagingArea;
use crate::VersioningContext;

/// One source-side change to replay onto the merge target
#[derive(Debug, Clone, PartialEq)]
enum StagedOp {
    Add { object_id: String, content: serde_json::Value },
    Change { object_id: String, content: serde_json::Value },
    Remove { object_id: String },
}

impl StagedOp {
    fn object_id(&self) -> &str {
        match self {
            StagedOp::Add { object_id, .. }
            | StagedOp::Change { object_id, .. }
            | StagedOp::Remove { object_id } => object_id,
        }
    }
}

/// Classifier output: changes to replay plus conflicts, never both applied
#[derive(Debug, Default)]
struct MergePlan {
    ops: Vec<StagedOp>,
    conflicts: Vec<Conflict>,
}

/// The revision if it represents a live object (tombstones read as absent)
fn live(revision: &Option<Revision>) -> Option<&Revision> {
    revision.as_ref().filter(|r| !r.deleted)
}

/// State equivalence for three-way classification
///
/// Absent and tombstoned are the same state; two live revisions are the
/// same state when their content matches, regardless of which branch or
/// commit produced them.
fn same_state(a: &Option<Revision>, b: &Option<Revision>) -> bool {
    match (live(a), live(b)) {
        (None, None) => true,
        (Some(x), Some(y)) => x.content == y.content,
        _ => false,
    }
}

/// Merge and rebase over a shared versioning context
pub struct MergeEngine {
    ctx: Arc<VersioningContext>,
}

impl MergeEngine {
    /// Engine over a context
    pub fn new(ctx: Arc<VersioningContext>) -> Self {
        MergeEngine { ctx }
    }

    /// Object ids either side may have diverged on
    ///
    /// For the child that is every object with a direct revision on the
    /// branch, whenever it was written: a rebase moves the fork point past
    /// the child's earlier commits, so filtering them by timestamp would
    /// silently drop unmerged work. For the parent only post-fork commits
    /// matter; everything older is part of the common ancestor.
    fn candidate_ids(
        &self,
        parent: &Branch,
        child: &Branch,
        fork: Timestamp,
    ) -> Result<BTreeSet<String>> {
        let index = &self.ctx.index;
        let mut ids: BTreeSet<String> =
            index.changes_since(&child.path, 0)?.into_keys().collect();
        ids.extend(index.changes_since(&parent.path, fork)?.into_keys());
        Ok(ids)
    }

    /// Three-way classification of everything either side may have touched
    ///
    /// The common ancestor is the parent branch as it looked at the child's
    /// fork point. It is resolved on the parent, never on the child: after
    /// a rebase the child's own older revisions are visible at the fork
    /// timestamp and must not masquerade as the base.
    fn classify(
        &self,
        source: &Branch,
        target: &Branch,
        parent: &Branch,
        child: &Branch,
        fork: Timestamp,
    ) -> Result<MergePlan> {
        let index = &self.ctx.index;
        let mut plan = MergePlan::default();

        for object_id in self.candidate_ids(parent, child, fork)? {
            let base = index.resolve(parent, &object_id, fork)?;
            let src = index.resolve(source, &object_id, source.head_timestamp)?;
            let tgt = index.resolve(target, &object_id, target.head_timestamp)?;

            // Convergent states (including both sides deleting) are no-ops
            if same_state(&src, &tgt) {
                continue;
            }
            // No source-side change: the target holds the newer state
            if same_state(&src, &base) {
                continue;
            }
            // Source-only change: flows to the target
            if same_state(&tgt, &base) {
                match (live(&src), live(&tgt).is_some()) {
                    (Some(rev), false) => plan.ops.push(StagedOp::Add {
                        object_id,
                        content: rev.content.clone(),
                    }),
                    (Some(rev), true) => plan.ops.push(StagedOp::Change {
                        object_id,
                        content: rev.content.clone(),
                    }),
                    (None, true) => plan.ops.push(StagedOp::Remove { object_id }),
                    (None, false) => {}
                }
                continue;
            }

            // Both sides moved away from the base in different directions
            let kind = match (live(&src).is_some(), live(&tgt).is_some()) {
                (true, true) => {
                    if live(&base).is_some() {
                        ConflictKind::ChangedChanged
                    } else {
                        ConflictKind::AddedAdded
                    }
                }
                _ => ConflictKind::DeletedWhileChanged,
            };
            let mut conflict = Conflict::new(
                object_id.as_str(),
                kind,
                format!("{object_id}: {kind} between {} and {}", source.path, target.path),
            );
            if let Some(rev) = src {
                conflict = conflict.with_source(rev);
            }
            if let Some(rev) = tgt {
                conflict = conflict.with_target(rev);
            }
            plan.conflicts.push(conflict);
        }
        Ok(plan)
    }

    /// Load a branch pair and identify the child (merges and rebases only
    /// operate between a branch and its direct parent)
    fn load_pair(
        &self,
        source_path: &BranchPath,
        target_path: &BranchPath,
    ) -> Result<(Branch, Branch, Timestamp)> {
        let source = self.ctx.registry.get_branch(source_path)?;
        let target = self.ctx.registry.get_branch(target_path)?;
        for branch in [&source, &target] {
            if branch.state.is_deleted() {
                return Err(TermStoreError::invalid(format!(
                    "branch {} is deleted",
                    branch.path
                )));
            }
        }
        let fork = if source.parent_path.as_ref() == Some(&target.path) {
            source.base_timestamp
        } else if target.parent_path.as_ref() == Some(&source.path) {
            target.base_timestamp
        } else {
            return Err(TermStoreError::invalid(format!(
                "{source_path} and {target_path} are not a parent/child pair"
            )));
        };
        Ok((source, target, fork))
    }

    /// Merge the source branch's changes into the target branch
    ///
    /// Applies the net source-side changes since the fork point to the
    /// target through a regular staging commit, so conflict processors and
    /// the optimistic head check both apply. The source branch is left
    /// untouched. Returns `Ok(None)` when the branches already agree and
    /// there is nothing to replay (fully convergent edits, or no changes at
    /// all); re-running a merge later to pick up new source commits is
    /// always safe.
    ///
    /// # Errors
    ///
    /// `MergeConflict` carrying the full conflict list if any object
    /// diverged on both sides, `Invalid` when the pair is unrelated,
    /// `StaleBranch` if the target head moved during the merge (retryable).
    pub fn merge(
        &self,
        source_path: &BranchPath,
        target_path: &BranchPath,
        author: &str,
        message: &str,
    ) -> Result<Option<CommitInfo>> {
        let (source, target, fork) = self.load_pair(source_path, target_path)?;
        let (parent, child) = if source.parent_path.as_ref() == Some(&target.path) {
            (&target, &source)
        } else {
            (&source, &target)
        };
        let plan = self.classify(&source, &target, parent, child, fork)?;

        if !plan.conflicts.is_empty() {
            tracing::warn!(
                source = %source_path,
                target = %target_path,
                count = plan.conflicts.len(),
                "merge rejected with conflicts"
            );
            return Err(TermStoreError::MergeConflict(plan.conflicts));
        }
        if plan.ops.is_empty() {
            tracing::debug!(
                source = %source_path,
                target = %target_path,
                "merge found nothing to replay"
            );
            return Ok(None);
        }

        let mut staging = StagingArea::open(Arc::clone(&self.ctx), target_path)?;
        for op in &plan.ops {
            match op {
                StagedOp::Add { object_id, content } => {
                    staging.stage_add(object_id, content.clone())?
                }
                StagedOp::Change { object_id, content } => {
                    staging.stage_change(object_id, content.clone())?
                }
                StagedOp::Remove { object_id } => staging.stage_remove(object_id)?,
            }
        }
        let info = staging.commit(author, message)?;
        tracing::info!(
            source = %source_path,
            target = %target_path,
            commit_timestamp = info.timestamp,
            objects = info.object_ids.len(),
            "merged"
        );
        Ok(Some(info))
    }

    /// Move a branch's fork point up to its parent's current head
    ///
    /// Writes no revisions: after the fork point moves, the parent's
    /// post-fork changes become visible through the ordinary ancestry walk,
    /// while the branch's own revisions keep shadowing everything they
    /// touch. Rejected with the full conflict list when any object changed
    /// on both sides, so a rebase never silently drops a parent change.
    ///
    /// # Errors
    ///
    /// `Invalid` for the root branch or when the branch is already based
    /// at the parent's head, `MergeConflict` on divergence, `StaleBranch`
    /// if the branch head moved concurrently (retryable).
    pub fn rebase(
        &self,
        branch_path: &BranchPath,
        author: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        let child = self.ctx.registry.get_branch(branch_path)?;
        if child.state.is_deleted() {
            return Err(TermStoreError::invalid(format!(
                "branch {branch_path} is deleted"
            )));
        }
        let parent_path = child.parent_path.clone().ok_or_else(|| {
            TermStoreError::invalid("the root branch cannot be rebased")
        })?;
        let parent = self.ctx.registry.get_branch(&parent_path)?;
        if parent.head_timestamp <= child.base_timestamp {
            return Err(TermStoreError::invalid(format!(
                "branch {branch_path} is already up to date with {parent_path}"
            )));
        }

        let fork = child.base_timestamp;
        let plan = self.classify(&parent, &child, &parent, &child, fork)?;
        if !plan.conflicts.is_empty() {
            tracing::warn!(
                branch = %branch_path,
                count = plan.conflicts.len(),
                "rebase rejected with conflicts"
            );
            return Err(TermStoreError::MergeConflict(plan.conflicts));
        }

        let new_head = self
            .ctx
            .clock
            .next_after(child.head_timestamp.max(parent.head_timestamp));
        self.ctx.registry.advance_head_rebased(
            branch_path,
            child.head_timestamp,
            new_head,
            parent.head_timestamp,
        )?;

        let mut object_ids: Vec<String> = plan
            .ops
            .iter()
            .map(|op| op.object_id().to_string())
            .collect();
        object_ids.sort_unstable();
        let info = CommitInfo {
            timestamp: new_head,
            branch_path: branch_path.clone(),
            author: author.to_string(),
            message: message.to_string(),
            object_ids,
            written_at: chrono::Utc::now(),
        };
        self.ctx.store.put(
            doc_types::COMMIT,
            &info.storage_id(),
            serde_json::to_value(&info)?,
        )?;
        tracing::info!(
            branch = %branch_path,
            new_base = parent.head_timestamp,
            commit_timestamp = new_head,
            "rebased"
        );
        Ok(info)
    }
}
