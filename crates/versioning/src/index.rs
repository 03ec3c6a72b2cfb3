//! Revision index: MVCC reads over the document store
//!
//! Resolves "what does this object look like on branch B at time T" by
//! walking the branch's precomputed ancestry segments. At each level only
//! revisions created at or before the segment cap (the child's fork point,
//! further bounded by `as_of`) and not yet replaced there are considered;
//! the first level holding a qualifying revision wins, so a child's own
//! edit always shadows an ancestor's later edits — tombstones included.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use termstore_core::error::{Result, TermStoreError};
use termstore_core::path::BranchPath;
use termstore_core::query::Query;
use termstore_core::traits::DocumentStore;
use termstore_core::types::{doc_types, Branch, Revision, Timestamp};

use crate::registry::BranchRegistry;

/// MVCC read layer over branches and revisions
pub struct RevisionIndex {
    store: Arc<dyn DocumentStore>,
    registry: Arc<BranchRegistry>,
}

impl RevisionIndex {
    /// Index over a store and registry
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<BranchRegistry>) -> Self {
        RevisionIndex { store, registry }
    }

    /// Load and decode one revision document
    fn load(&self, storage_id: &str) -> Result<Revision> {
        let doc = self
            .store
            .get(doc_types::REVISION, storage_id)?
            .ok_or_else(|| {
                TermStoreError::storage(format!("revision document vanished: {storage_id}"))
            })?;
        Ok(serde_json::from_value(doc)?)
    }

    /// All stored revisions of one object on exactly one branch
    fn object_revisions_on(&self, path: &BranchPath, object_id: &str) -> Result<Vec<Revision>> {
        let query = Query::all()
            .eq("object_id", object_id)
            .eq("branch_path", path.as_str());
        let ids = self.store.search(doc_types::REVISION, &query)?;
        ids.iter().map(|id| self.load(id)).collect()
    }

    /// The revision visible at `cap` on one ancestry segment, if any
    fn segment_revision(
        &self,
        path: &BranchPath,
        object_id: &str,
        cap: Timestamp,
    ) -> Result<Option<Revision>> {
        let visible = self
            .object_revisions_on(path, object_id)?
            .into_iter()
            .filter(|rev| rev.visible_at(cap))
            .max_by_key(|rev| rev.created_timestamp);
        Ok(visible)
    }

    /// Raw MVCC resolution against a branch snapshot
    ///
    /// Returns the winning revision including tombstones; callers that only
    /// care about live objects use [`read`](Self::read).
    pub fn resolve(
        &self,
        branch: &Branch,
        object_id: &str,
        as_of: Timestamp,
    ) -> Result<Option<Revision>> {
        for (path, cap) in branch.segments_at(as_of) {
            if let Some(revision) = self.segment_revision(path, object_id, cap)? {
                return Ok(Some(revision));
            }
        }
        Ok(None)
    }

    /// Load the branch for a read, rejecting deleted branches
    fn branch_for_read(&self, branch_path: &BranchPath) -> Result<Branch> {
        let branch = self.registry.get_branch(branch_path)?;
        if branch.state.is_deleted() {
            return Err(TermStoreError::invalid(format!(
                "branch {branch_path} is deleted"
            )));
        }
        Ok(branch)
    }

    /// Visible revision of an object on a branch at `as_of`
    ///
    /// Tombstones read as `None`.
    pub fn read(
        &self,
        branch_path: &BranchPath,
        object_id: &str,
        as_of: Timestamp,
    ) -> Result<Option<Revision>> {
        let branch = self.branch_for_read(branch_path)?;
        self.read_on(&branch, object_id, as_of)
    }

    /// `read` against an already-loaded branch snapshot
    pub fn read_on(
        &self,
        branch: &Branch,
        object_id: &str,
        as_of: Timestamp,
    ) -> Result<Option<Revision>> {
        Ok(self
            .resolve(branch, object_id, as_of)?
            .filter(|rev| !rev.deleted))
    }

    /// Visible revision at the branch head
    pub fn read_at_branch_head(
        &self,
        branch_path: &BranchPath,
        object_id: &str,
    ) -> Result<Option<Revision>> {
        let branch = self.branch_for_read(branch_path)?;
        let head = branch.head_timestamp;
        self.read_on(&branch, object_id, head)
    }

    /// Content-level search with branch/time overlay
    ///
    /// Raw matching is delegated to the document store per ancestry segment;
    /// every candidate object id is then re-resolved with the shadowing rule
    /// and kept only if its resolved content still matches.
    pub fn search(
        &self,
        branch_path: &BranchPath,
        query: &Query,
        as_of: Timestamp,
    ) -> Result<Vec<Revision>> {
        let branch = self.branch_for_read(branch_path)?;
        let content_query = query.nested_under("content");

        let mut candidates = BTreeSet::new();
        for (path, _cap) in branch.segments_at(as_of) {
            let segment_query = content_query.clone().eq("branch_path", path.as_str());
            for id in self.store.search(doc_types::REVISION, &segment_query)? {
                candidates.insert(self.load(&id)?.object_id);
            }
        }

        let mut results = Vec::new();
        for object_id in candidates {
            if let Some(revision) = self.read_on(&branch, &object_id, as_of)? {
                if query.matches(&revision.content) {
                    results.push(revision);
                }
            }
        }
        Ok(results)
    }

    /// Net change per object committed directly on `branch_path` after `since`
    ///
    /// Returns the latest such revision per object id, tombstones included.
    /// Feeds the merge engine's candidate set; note that a rebase can move a
    /// branch's fork point past its own earlier commits, so callers pass
    /// `since = 0` when every direct revision matters.
    pub fn changes_since(
        &self,
        branch_path: &BranchPath,
        since: Timestamp,
    ) -> Result<BTreeMap<String, Revision>> {
        let query = Query::all().eq("branch_path", branch_path.as_str());
        let mut latest: BTreeMap<String, Revision> = BTreeMap::new();
        for id in self.store.search(doc_types::REVISION, &query)? {
            let revision = self.load(&id)?;
            if revision.created_timestamp <= since {
                continue;
            }
            match latest.get(&revision.object_id) {
                Some(seen) if seen.created_timestamp >= revision.created_timestamp => {}
                _ => {
                    latest.insert(revision.object_id.clone(), revision);
                }
            }
        }
        Ok(latest)
    }
}
