//! Branch registry, MVCC revision index, staging commits, merge and rebase
//!
//! Everything here operates over a single [`VersioningContext`]: one
//! document store, one branch registry, one revision index and one commit
//! clock, shared by staging areas and the merge engine. The context owns
//! the conflict processors that every commit runs before writing.

pub mod clock;
pub mod index;
pub mod merge;
pub mod processor;
pub mod registry;
pub mod staging;

pub use clock::CommitClock;
pub use index::RevisionIndex;
pub use merge::MergeEngine;
pub use processor::{ConflictProcessor, ReferenceIntegrityProcessor};
pub use registry::BranchRegistry;
pub use staging::{ChangeSet, ChangedEntry, StagingArea, StagingStatus};

use std::sync::Arc;

use termstore_core::error::{Result, TermStoreError};
use termstore_core::traits::DocumentStore;
use termstore_core::VersioningConfig;

/// Shared state behind every versioning operation
pub struct VersioningContext {
    /// Backing document store
    pub store: Arc<dyn DocumentStore>,
    /// Branch topology and head pointers
    pub registry: Arc<BranchRegistry>,
    /// MVCC read layer
    pub index: RevisionIndex,
    /// Commit timestamp allocator
    pub clock: CommitClock,
    /// Operational limits
    pub config: VersioningConfig,
    /// Pre-commit validation hooks, run in order on every commit
    pub processors: Vec<Box<dyn ConflictProcessor>>,
}

impl VersioningContext {
    /// Open a context over a store, bootstrapping the root branch if the
    /// store is empty
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: VersioningConfig,
        processors: Vec<Box<dyn ConflictProcessor>>,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(TermStoreError::invalid)?;
        let clock = CommitClock::new();
        let registry = Arc::new(BranchRegistry::open(Arc::clone(&store), &config, &clock)?);
        let index = RevisionIndex::new(Arc::clone(&store), Arc::clone(&registry));
        Ok(Arc::new(VersioningContext {
            store,
            registry,
            index,
            clock,
            config,
            processors,
        }))
    }
}
