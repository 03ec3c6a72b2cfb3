//! Shared helpers for the end-to-end suite

use serde_json::Value;
use termstore::{BranchPath, CommitInfo, StagingArea, TermStore};

/// Log output for failing tests; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Fresh in-memory store with the default processor set
pub fn store() -> TermStore {
    init_tracing();
    TermStore::in_memory().unwrap()
}

pub fn path(p: &str) -> BranchPath {
    BranchPath::new(p).unwrap()
}

/// Stage and commit in one go, panicking on any failure
pub fn commit<F>(store: &TermStore, branch: &str, message: &str, stage: F) -> CommitInfo
where
    F: FnOnce(&mut StagingArea),
{
    let mut staging = store.open_staging(&path(branch)).unwrap();
    stage(&mut staging);
    staging.commit("test", message).unwrap()
}

/// Content visible at the branch head, `None` when absent
pub fn content(store: &TermStore, branch: &str, object_id: &str) -> Option<Value> {
    store
        .get_object(&path(branch), object_id)
        .unwrap()
        .map(|rev| rev.content)
}
