//! The `TermStore` facade
//!
//! Thin entry point tying the registry, index, staging and merge engine
//! together behind one handle. All methods delegate; the semantics live in
//! the `termstore-versioning` crate.

use std::sync::Arc;

use termstore_core::{
    doc_types, Branch, BranchPath, CommitInfo, DocumentStore, Query, Result, Revision,
    TermStoreError, Timestamp, VersioningConfig,
};
use termstore_storage::MemoryStore;
use termstore_versioning::{
    ConflictProcessor, MergeEngine, ReferenceIntegrityProcessor, StagingArea, VersioningContext,
};

/// Branching, revision-controlled document store
///
/// Cheap to share: wrap it in an `Arc` and hand clones of that to every
/// caller. All operations are safe under concurrent use; writers that race
/// on the same branch lose with a retryable [`StaleBranch`] error.
///
/// [`StaleBranch`]: TermStoreError::StaleBranch
pub struct TermStore {
    ctx: Arc<VersioningContext>,
    merge: MergeEngine,
}

impl TermStore {
    /// Open a store over a document backend with default limits and the
    /// standard conflict processors
    pub fn new(store: Arc<dyn DocumentStore>) -> Result<Self> {
        Self::with_options(
            store,
            VersioningConfig::default(),
            vec![Box::new(ReferenceIntegrityProcessor)],
        )
    }

    /// Open a store with explicit limits and conflict processors
    pub fn with_options(
        store: Arc<dyn DocumentStore>,
        config: VersioningConfig,
        processors: Vec<Box<dyn ConflictProcessor>>,
    ) -> Result<Self> {
        let ctx = VersioningContext::new(store, config, processors)?;
        let merge = MergeEngine::new(Arc::clone(&ctx));
        Ok(TermStore { ctx, merge })
    }

    /// Ephemeral store over the in-memory backend
    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Fork a new branch off `parent` at its current head
    pub fn create_branch(&self, parent: &BranchPath, name: &str) -> Result<Branch> {
        self.ctx.registry.create_branch(parent, name)
    }

    /// Snapshot of one branch, including its computed state
    pub fn branch(&self, path: &BranchPath) -> Result<Branch> {
        self.ctx.registry.get_branch(path)
    }

    /// Direct, non-deleted children of a branch
    pub fn children(&self, path: &BranchPath) -> Result<Vec<Branch>> {
        self.ctx.registry.list_children(path)
    }

    /// Mark a branch deleted
    ///
    /// Its revisions stay in the store (children that forked from it keep
    /// reading them) but the branch refuses further reads and writes.
    /// Rejected with [`UnmergedChild`] while an active child still carries
    /// its own commits.
    ///
    /// [`UnmergedChild`]: TermStoreError::UnmergedChild
    pub fn delete_branch(&self, path: &BranchPath) -> Result<()> {
        self.ctx.registry.delete(path)
    }

    /// Open a staging transaction against the branch's current head
    pub fn open_staging(&self, path: &BranchPath) -> Result<StagingArea> {
        StagingArea::open(Arc::clone(&self.ctx), path)
    }

    /// Object as visible at the branch head
    pub fn get_object(&self, path: &BranchPath, object_id: &str) -> Result<Option<Revision>> {
        self.ctx.index.read_at_branch_head(path, object_id)
    }

    /// Object as visible on the branch at a point in time
    pub fn get_object_at(
        &self,
        path: &BranchPath,
        object_id: &str,
        as_of: Timestamp,
    ) -> Result<Option<Revision>> {
        self.ctx.index.read(path, object_id, as_of)
    }

    /// Content search on a branch, at its head or at a point in time
    pub fn search(
        &self,
        path: &BranchPath,
        query: &Query,
        as_of: Option<Timestamp>,
    ) -> Result<Vec<Revision>> {
        let as_of = match as_of {
            Some(ts) => ts,
            None => self.ctx.registry.get_branch(path)?.head_timestamp,
        };
        self.ctx.index.search(path, query, as_of)
    }

    /// Merge the source branch's changes into the target branch
    ///
    /// `Ok(None)` means the branches already agree and nothing was
    /// committed; re-running a merge is always safe.
    pub fn merge(
        &self,
        source: &BranchPath,
        target: &BranchPath,
        author: &str,
        message: &str,
    ) -> Result<Option<CommitInfo>> {
        self.merge.merge(source, target, author, message)
    }

    /// Move a branch's fork point up to its parent's current head
    pub fn rebase(&self, path: &BranchPath, author: &str, message: &str) -> Result<CommitInfo> {
        self.merge.rebase(path, author, message)
    }

    /// Commits recorded on a branch, newest first
    pub fn history(&self, path: &BranchPath) -> Result<Vec<CommitInfo>> {
        self.ctx.registry.get_branch(path)?;
        let query = Query::all().eq("branch_path", path.as_str());
        let mut commits = Vec::new();
        for id in self.ctx.store.search(doc_types::COMMIT, &query)? {
            let doc = self.ctx.store.get(doc_types::COMMIT, &id)?.ok_or_else(|| {
                TermStoreError::storage(format!("commit document vanished: {id}"))
            })?;
            commits.push(serde_json::from_value::<CommitInfo>(doc)?);
        }
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(commits)
    }
}
