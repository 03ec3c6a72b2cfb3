//! Branch lifecycle through the public API

use serde_json::json;
use std::sync::Arc;
use termstore::{
    BranchPath, BranchState, MemoryStore, TermStore, TermStoreError, VersioningConfig,
};

use crate::util::{commit, content, path, store};

#[test]
fn test_root_branch_exists_from_the_start() {
    let store = store();
    let main = store.branch(&BranchPath::root()).unwrap();
    assert!(main.path.is_root());
    assert_eq!(main.state, BranchState::Active);
    assert_eq!(main.parent_path, None);
}

#[test]
fn test_branch_tree_navigation() {
    let store = store();
    store.create_branch(&BranchPath::root(), "release").unwrap();
    let review = store.create_branch(&BranchPath::root(), "review").unwrap();
    store.create_branch(&review.path, "subtask").unwrap();

    let children = store.children(&BranchPath::root()).unwrap();
    let names: Vec<&str> = children.iter().map(|b| b.path.name()).collect();
    assert_eq!(names, vec!["release", "review"]);

    let grandchildren = store.children(&review.path).unwrap();
    assert_eq!(grandchildren.len(), 1);
    assert_eq!(grandchildren[0].path.as_str(), "MAIN/review/subtask");
    assert_eq!(grandchildren[0].parent_path, Some(review.path.clone()));
}

#[test]
fn test_invalid_branch_names_rejected() {
    assert!(BranchPath::new("").is_err());
    assert!(BranchPath::new("review").is_err());
    assert!(BranchPath::new("MAIN//review").is_err());
    assert!(BranchPath::new("MAIN/with space").is_err());

    let store = store();
    assert!(matches!(
        store.create_branch(&BranchPath::root(), "has space"),
        Err(TermStoreError::Invalid(_))
    ));
    assert!(matches!(
        store.create_branch(&BranchPath::root(), ""),
        Err(TermStoreError::Invalid(_))
    ));
}

#[test]
fn test_duplicate_branch_rejected() {
    let store = store();
    store.create_branch(&BranchPath::root(), "review").unwrap();
    assert!(matches!(
        store.create_branch(&BranchPath::root(), "review"),
        Err(TermStoreError::AlreadyExists(_))
    ));
}

#[test]
fn test_branch_goes_stale_when_parent_advances() {
    let store = store();
    let review = store.create_branch(&BranchPath::root(), "review").unwrap();
    assert_eq!(review.state, BranchState::Active);

    commit(&store, "MAIN", "parent moves", |s| {
        s.stage_add("concept-1", json!({})).unwrap();
    });

    let review = store.branch(&review.path).unwrap();
    assert_eq!(review.state, BranchState::Stale);
    assert!(review.state.is_writable());
}

#[test]
fn test_delete_branch_lifecycle() {
    let store = store();
    let review = store.create_branch(&BranchPath::root(), "review").unwrap();
    commit(&store, "MAIN/review", "some work", |s| {
        s.stage_add("concept-1", json!({})).unwrap();
    });

    store.delete_branch(&review.path).unwrap();
    let review = store.branch(&review.path).unwrap();
    assert_eq!(review.state, BranchState::Deleted);

    // Deleted branches refuse reads and writes
    assert!(matches!(
        store.get_object(&review.path, "concept-1"),
        Err(TermStoreError::Invalid(_))
    ));
    assert!(matches!(
        store.open_staging(&review.path),
        Err(TermStoreError::Invalid(_))
    ));
    // And disappear from listings
    assert!(store.children(&BranchPath::root()).unwrap().is_empty());
    // Deleting again is a no-op
    store.delete_branch(&review.path).unwrap();
}

#[test]
fn test_delete_guards() {
    let store = store();
    assert!(matches!(
        store.delete_branch(&BranchPath::root()),
        Err(TermStoreError::Invalid(_))
    ));

    let review = store.create_branch(&BranchPath::root(), "review").unwrap();
    let sub = store.create_branch(&review.path, "subtask").unwrap();
    commit(&store, "MAIN/review/subtask", "unmerged work", |s| {
        s.stage_add("concept-1", json!({})).unwrap();
    });

    assert!(matches!(
        store.delete_branch(&review.path),
        Err(TermStoreError::UnmergedChild { .. })
    ));
    store.delete_branch(&sub.path).unwrap();
    store.delete_branch(&review.path).unwrap();
}

#[test]
fn test_branching_off_deleted_branch_rejected() {
    let store = store();
    let review = store.create_branch(&BranchPath::root(), "review").unwrap();
    store.delete_branch(&review.path).unwrap();
    assert!(matches!(
        store.create_branch(&review.path, "subtask"),
        Err(TermStoreError::Invalid(_))
    ));
}

#[test]
fn test_depth_limit_enforced() {
    let store = TermStore::with_options(
        Arc::new(MemoryStore::new()),
        VersioningConfig {
            max_branch_depth: 3,
            ..VersioningConfig::default()
        },
        Vec::new(),
    )
    .unwrap();

    let a = store.create_branch(&BranchPath::root(), "a").unwrap();
    let b = store.create_branch(&a.path, "b").unwrap();
    assert!(matches!(
        store.create_branch(&b.path, "c"),
        Err(TermStoreError::Invalid(_))
    ));
}

#[test]
fn test_store_reopens_from_backend() {
    let backend = Arc::new(MemoryStore::new());
    {
        let store = TermStore::new(Arc::clone(&backend) as _).unwrap();
        store.create_branch(&BranchPath::root(), "review").unwrap();
        commit(&store, "MAIN/review", "persisted work", |s| {
            s.stage_add("concept-1", json!({"label": "kept"})).unwrap();
        });
    }

    let reopened = TermStore::new(backend as _).unwrap();
    let review = reopened.branch(&path("MAIN/review")).unwrap();
    assert_eq!(review.state, BranchState::Active);
    assert_eq!(
        content(&reopened, "MAIN/review", "concept-1"),
        Some(json!({"label": "kept"}))
    );
}
