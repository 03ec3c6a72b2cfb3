//! Branch registry
//!
//! Authoritative record of branch topology and head pointers. Callers only
//! ever see immutable `Branch` snapshots with a precomputed ancestry chain;
//! mutation goes through `create_branch`, the compare-and-swap head advance,
//! and `delete`. Branch records persist as `"branch"` documents in the
//! document store, so a registry reopened over the same store resumes where
//! it left off.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use termstore_core::error::{Result, TermStoreError};
use termstore_core::path::BranchPath;
use termstore_core::query::Query;
use termstore_core::traits::DocumentStore;
use termstore_core::types::{doc_types, AncestrySegment, Branch, BranchState, Timestamp};
use termstore_core::VersioningConfig;

use crate::clock::CommitClock;

/// Stored shape of one branch
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct BranchRecord {
    path: BranchPath,
    parent_path: Option<BranchPath>,
    base_timestamp: Timestamp,
    head_timestamp: Timestamp,
    deleted: bool,
}

/// Branch topology, head pointers and per-branch commit serialization
pub struct BranchRegistry {
    store: Arc<dyn DocumentStore>,
    branches: RwLock<HashMap<String, BranchRecord>>,
    /// One mutex per branch, held across the apply-batch + head-CAS window
    /// of a commit so concurrent commits to the same branch cannot interleave
    /// their storage writes. Lost races still surface as `StaleBranch`.
    commit_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    max_depth: usize,
}

impl BranchRegistry {
    /// Open the registry over a document store, creating the root branch
    /// if the store holds no branches yet
    pub fn open(
        store: Arc<dyn DocumentStore>,
        config: &VersioningConfig,
        clock: &CommitClock,
    ) -> Result<Self> {
        let mut branches = HashMap::new();
        for id in store.search(doc_types::BRANCH, &Query::all())? {
            let doc = store.get(doc_types::BRANCH, &id)?.ok_or_else(|| {
                TermStoreError::storage(format!("branch document vanished during load: {id}"))
            })?;
            let record: BranchRecord = serde_json::from_value(doc)?;
            branches.insert(record.path.as_str().to_string(), record);
        }

        let registry = BranchRegistry {
            store,
            branches: RwLock::new(branches),
            commit_locks: Mutex::new(HashMap::new()),
            max_depth: config.max_branch_depth,
        };

        if !registry.branches.read().contains_key(BranchPath::root().as_str()) {
            let birth = clock.next_after(0);
            let root = BranchRecord {
                path: BranchPath::root(),
                parent_path: None,
                base_timestamp: birth,
                head_timestamp: birth,
                deleted: false,
            };
            registry.persist(&root)?;
            registry
                .branches
                .write()
                .insert(root.path.as_str().to_string(), root);
            tracing::info!(timestamp = birth, "created root branch");
        }

        Ok(registry)
    }

    /// Write a branch record to the store
    fn persist(&self, record: &BranchRecord) -> Result<()> {
        self.store.put(
            doc_types::BRANCH,
            record.path.as_str(),
            serde_json::to_value(record)?,
        )
    }

    /// Build an immutable snapshot with ancestry and computed state
    fn snapshot(records: &HashMap<String, BranchRecord>, record: &BranchRecord) -> Branch {
        let mut ancestry = vec![AncestrySegment {
            path: record.path.clone(),
            cap: Timestamp::MAX,
        }];
        let mut cap = record.base_timestamp;
        let mut cursor = record.parent_path.clone();
        while let Some(parent_path) = cursor {
            ancestry.push(AncestrySegment {
                path: parent_path.clone(),
                cap,
            });
            match records.get(parent_path.as_str()) {
                Some(parent) => {
                    cap = cap.min(parent.base_timestamp);
                    cursor = parent.parent_path.clone();
                }
                None => cursor = None,
            }
        }

        let state = if record.deleted {
            BranchState::Deleted
        } else {
            let parent_moved = record
                .parent_path
                .as_ref()
                .and_then(|p| records.get(p.as_str()))
                .is_some_and(|parent| parent.head_timestamp > record.base_timestamp);
            if parent_moved {
                BranchState::Stale
            } else {
                BranchState::Active
            }
        };

        Branch {
            path: record.path.clone(),
            parent_path: record.parent_path.clone(),
            base_timestamp: record.base_timestamp,
            head_timestamp: record.head_timestamp,
            state,
            ancestry,
        }
    }

    /// Create a child branch forked at the parent's current head
    ///
    /// # Errors
    ///
    /// `NotFound` if the parent is missing, `AlreadyExists` on a path
    /// collision, `Invalid` for deleted parents or excessive nesting.
    pub fn create_branch(&self, parent_path: &BranchPath, name: &str) -> Result<Branch> {
        let child_path = parent_path.child(name)?;
        let mut branches = self.branches.write();

        let parent = branches
            .get(parent_path.as_str())
            .ok_or_else(|| TermStoreError::not_found(format!("branch {parent_path}")))?;
        if parent.deleted {
            return Err(TermStoreError::invalid(format!(
                "cannot branch off deleted branch {parent_path}"
            )));
        }
        if branches.contains_key(child_path.as_str()) {
            return Err(TermStoreError::already_exists(format!(
                "branch {child_path}"
            )));
        }

        let record = BranchRecord {
            path: child_path.clone(),
            parent_path: Some(parent_path.clone()),
            base_timestamp: parent.head_timestamp,
            head_timestamp: parent.head_timestamp,
            deleted: false,
        };
        let branch = Self::snapshot(&branches, &record);
        if branch.ancestry.len() > self.max_depth {
            return Err(TermStoreError::invalid(format!(
                "branch {child_path} exceeds max depth {}",
                self.max_depth
            )));
        }

        self.persist(&record)?;
        branches.insert(child_path.as_str().to_string(), record);
        tracing::info!(branch = %child_path, fork_point = branch.base_timestamp, "created branch");
        Ok(branch)
    }

    /// Immutable snapshot of one branch (including deleted ones)
    pub fn get_branch(&self, path: &BranchPath) -> Result<Branch> {
        let branches = self.branches.read();
        let record = branches
            .get(path.as_str())
            .ok_or_else(|| TermStoreError::not_found(format!("branch {path}")))?;
        Ok(Self::snapshot(&branches, record))
    }

    /// Snapshots of the direct, non-deleted children of `path`
    pub fn list_children(&self, path: &BranchPath) -> Result<Vec<Branch>> {
        let branches = self.branches.read();
        if !branches.contains_key(path.as_str()) {
            return Err(TermStoreError::not_found(format!("branch {path}")));
        }
        let mut children: Vec<Branch> = branches
            .values()
            .filter(|r| !r.deleted && r.parent_path.as_ref() == Some(path))
            .map(|r| Self::snapshot(&branches, r))
            .collect();
        children.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(children)
    }

    /// Atomic compare-and-swap head advance
    ///
    /// # Errors
    ///
    /// `StaleBranch` if `expected` no longer matches the stored head (a
    /// concurrent commit won the race); the caller reloads and re-stages.
    pub fn advance_head(
        &self,
        path: &BranchPath,
        expected: Timestamp,
        new_head: Timestamp,
    ) -> Result<()> {
        self.advance(path, expected, new_head, None)
    }

    /// Head advance that also moves the fork point (rebase)
    pub fn advance_head_rebased(
        &self,
        path: &BranchPath,
        expected: Timestamp,
        new_head: Timestamp,
        new_base: Timestamp,
    ) -> Result<()> {
        self.advance(path, expected, new_head, Some(new_base))
    }

    fn advance(
        &self,
        path: &BranchPath,
        expected: Timestamp,
        new_head: Timestamp,
        new_base: Option<Timestamp>,
    ) -> Result<()> {
        if new_head <= expected {
            return Err(TermStoreError::invalid(format!(
                "new head {new_head} must be greater than expected head {expected}"
            )));
        }
        let mut branches = self.branches.write();
        let record = branches
            .get(path.as_str())
            .ok_or_else(|| TermStoreError::not_found(format!("branch {path}")))?;
        if record.deleted {
            return Err(TermStoreError::invalid(format!(
                "branch {path} is deleted"
            )));
        }
        if record.head_timestamp != expected {
            return Err(TermStoreError::StaleBranch {
                path: path.as_str().to_string(),
                expected,
                actual: record.head_timestamp,
            });
        }

        let mut updated = record.clone();
        updated.head_timestamp = new_head;
        if let Some(base) = new_base {
            updated.base_timestamp = base;
        }
        // Persist before mutating memory: a store failure leaves the
        // in-memory head untouched.
        self.persist(&updated)?;
        branches.insert(path.as_str().to_string(), updated);
        Ok(())
    }

    /// Mark a branch deleted
    ///
    /// # Errors
    ///
    /// `Invalid` for the root branch; `UnmergedChild` when an active child
    /// still carries its own commits (head past its fork point), so callers
    /// can surface the rejection as a conflict rather than misuse.
    pub fn delete(&self, path: &BranchPath) -> Result<()> {
        if path.is_root() {
            return Err(TermStoreError::invalid("cannot delete the root branch"));
        }
        let mut branches = self.branches.write();
        let record = branches
            .get(path.as_str())
            .ok_or_else(|| TermStoreError::not_found(format!("branch {path}")))?;
        if record.deleted {
            return Ok(());
        }

        let unmerged_child = branches.values().find(|r| {
            !r.deleted
                && r.parent_path.as_ref() == Some(path)
                && r.head_timestamp > r.base_timestamp
        });
        if let Some(child) = unmerged_child {
            return Err(TermStoreError::UnmergedChild {
                path: path.as_str().to_string(),
                child: child.path.as_str().to_string(),
            });
        }

        let mut updated = record.clone();
        updated.deleted = true;
        self.persist(&updated)?;
        branches.insert(path.as_str().to_string(), updated);
        tracing::info!(branch = %path, "deleted branch");
        Ok(())
    }

    /// Per-branch mutex serializing the apply+CAS window of commits
    pub fn commit_lock(&self, path: &BranchPath) -> Arc<Mutex<()>> {
        Arc::clone(
            self.commit_locks
                .lock()
                .entry(path.as_str().to_string())
                .or_default(),
        )
    }
}
