//! Merge and rebase workflows through the public API

use serde_json::json;
use termstore::{BranchPath, BranchState, ConflictKind, TermStoreError};

use crate::util::{commit, content, path, store};

#[test]
fn test_review_workflow_edit_merge_delete() {
    let store = store();
    commit(&store, "MAIN", "import", |s| {
        s.stage_add("concept-1", json!({"label": "Sepsis"})).unwrap();
    });

    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "refine", |s| {
        s.stage_change("concept-1", json!({"label": "Sepsis (disorder)"}))
            .unwrap();
    });

    let info = store
        .merge(&review.path, &path("MAIN"), "alice", "apply review")
        .unwrap()
        .unwrap();
    assert_eq!(info.branch_path, path("MAIN"));
    assert_eq!(
        content(&store, "MAIN", "concept-1"),
        Some(json!({"label": "Sepsis (disorder)"}))
    );

    // Everything merged, so the branch can go
    store.delete_branch(&review.path).unwrap();
}

#[test]
fn test_merge_is_recorded_in_target_history() {
    let store = store();
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "work", |s| {
        s.stage_add("concept-1", json!({})).unwrap();
    });
    store
        .merge(&review.path, &path("MAIN"), "alice", "promote")
        .unwrap();

    let history = store.history(&path("MAIN")).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "promote");
    assert_eq!(history[0].author, "alice");
    assert_eq!(history[0].object_ids, vec!["concept-1"]);
}

#[test]
fn test_conflicting_merge_reports_every_conflict() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("edited-both", json!({"v": 0})).unwrap();
        s.stage_add("deleted-vs-edited", json!({"v": 0})).unwrap();
    });
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "child side", |s| {
        s.stage_change("edited-both", json!({"v": "child"})).unwrap();
        s.stage_remove("deleted-vs-edited").unwrap();
        s.stage_add("added-both", json!({"v": "child"})).unwrap();
    });
    commit(&store, "MAIN", "parent side", |s| {
        s.stage_change("edited-both", json!({"v": "parent"})).unwrap();
        s.stage_change("deleted-vs-edited", json!({"v": "parent"})).unwrap();
        s.stage_add("added-both", json!({"v": "parent"})).unwrap();
    });

    let err = store
        .merge(&review.path, &path("MAIN"), "alice", "collide")
        .unwrap_err();
    let conflicts = err.conflicts();
    assert_eq!(conflicts.len(), 3);

    let kind_of = |id: &str| {
        conflicts
            .iter()
            .find(|c| c.object_id == id)
            .unwrap_or_else(|| panic!("no conflict for {id}"))
            .kind
    };
    assert_eq!(kind_of("edited-both"), ConflictKind::ChangedChanged);
    assert_eq!(kind_of("deleted-vs-edited"), ConflictKind::DeletedWhileChanged);
    assert_eq!(kind_of("added-both"), ConflictKind::AddedAdded);

    // Rejected merges change nothing on the target
    assert_eq!(content(&store, "MAIN", "edited-both"), Some(json!({"v": "parent"})));
}

#[test]
fn test_conflict_resolution_by_re_editing_then_merging() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("concept-1", json!({"v": 0})).unwrap();
    });
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "child edit", |s| {
        s.stage_change("concept-1", json!({"v": "child"})).unwrap();
    });
    commit(&store, "MAIN", "parent edit", |s| {
        s.stage_change("concept-1", json!({"v": "parent"})).unwrap();
    });

    assert!(store
        .merge(&review.path, &path("MAIN"), "alice", "collide")
        .is_err());

    // Adopt the parent's value on the branch; the edit converges and the
    // merge succeeds with nothing to commit
    commit(&store, "MAIN/review", "take theirs", |s| {
        s.stage_change("concept-1", json!({"v": "parent"})).unwrap();
    });
    let head_before = store.branch(&path("MAIN")).unwrap().head_timestamp;
    assert_eq!(
        store
            .merge(&review.path, &path("MAIN"), "alice", "converged")
            .unwrap(),
        None
    );
    assert_eq!(store.branch(&path("MAIN")).unwrap().head_timestamp, head_before);
}

#[test]
fn test_rebase_then_merge_back() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("base", json!({"v": 0})).unwrap();
    });
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "branch work", |s| {
        s.stage_add("mine", json!({})).unwrap();
    });
    commit(&store, "MAIN", "parent work", |s| {
        s.stage_add("theirs", json!({})).unwrap();
    });

    assert_eq!(store.branch(&review.path).unwrap().state, BranchState::Stale);
    store.rebase(&review.path, "alice", "catch up").unwrap();

    let review_branch = store.branch(&review.path).unwrap();
    assert_eq!(review_branch.state, BranchState::Active);
    assert_eq!(content(&store, "MAIN/review", "theirs"), Some(json!({})));
    assert_eq!(content(&store, "MAIN/review", "mine"), Some(json!({})));

    // After the rebase only the branch's own work flows back
    let info = store
        .merge(&review.path, &path("MAIN"), "alice", "promote")
        .unwrap()
        .expect("branch work committed before the rebase must still merge");
    assert_eq!(info.object_ids, vec!["mine"]);
    assert_eq!(content(&store, "MAIN", "mine"), Some(json!({})));
}

#[test]
fn test_parent_edit_after_rebase_still_conflicts() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("concept-1", json!({"v": 0})).unwrap();
    });
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "branch edit", |s| {
        s.stage_change("concept-1", json!({"v": "child"})).unwrap();
    });
    commit(&store, "MAIN", "unrelated", |s| {
        s.stage_add("other", json!({})).unwrap();
    });
    store.rebase(&review.path, "alice", "catch up").unwrap();

    // The branch's edit now predates its fork point, but it is still
    // unmerged work: a parent edit to the same object must surface as a
    // conflict on the next rebase instead of shadowing the parent silently
    commit(&store, "MAIN", "parent edit", |s| {
        s.stage_change("concept-1", json!({"v": "parent"})).unwrap();
    });
    let err = store.rebase(&review.path, "alice", "catch up again").unwrap_err();
    assert_eq!(err.conflicts()[0].kind, ConflictKind::ChangedChanged);

    let err = store
        .merge(&review.path, &path("MAIN"), "alice", "promote")
        .unwrap_err();
    assert_eq!(err.conflicts()[0].kind, ConflictKind::ChangedChanged);
    assert_eq!(content(&store, "MAIN", "concept-1"), Some(json!({"v": "parent"})));
}

#[test]
fn test_rebase_conflict_leaves_branch_untouched() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("concept-1", json!({"v": 0})).unwrap();
    });
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    let base_before = store.branch(&review.path).unwrap().base_timestamp;
    commit(&store, "MAIN/review", "child edit", |s| {
        s.stage_change("concept-1", json!({"v": "child"})).unwrap();
    });
    commit(&store, "MAIN", "parent edit", |s| {
        s.stage_change("concept-1", json!({"v": "parent"})).unwrap();
    });

    let err = store.rebase(&review.path, "alice", "catch up").unwrap_err();
    assert_eq!(err.conflicts()[0].kind, ConflictKind::ChangedChanged);
    assert_eq!(
        store.branch(&review.path).unwrap().base_timestamp,
        base_before
    );
}

#[test]
fn test_rebase_recorded_in_branch_history() {
    let store = store();
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN", "parent work", |s| {
        s.stage_add("theirs", json!({})).unwrap();
    });

    let info = store.rebase(&review.path, "alice", "refresh").unwrap();
    assert_eq!(info.object_ids, vec!["theirs"]);
    let history = store.history(&review.path).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "refresh");
}

#[test]
fn test_merge_enforces_reference_integrity_on_target() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("target-obj", json!({})).unwrap();
    });
    let review = store.create_branch(&path("MAIN"), "review").unwrap();
    // The reference is fine on the branch where target-obj is visible
    commit(&store, "MAIN/review", "link", |s| {
        s.stage_add("referrer", json!({"references": ["target-obj"]})).unwrap();
    });
    // But the parent removed the referent after the fork
    commit(&store, "MAIN", "remove referent", |s| {
        s.stage_remove("target-obj").unwrap();
    });

    let err = store
        .merge(&review.path, &path("MAIN"), "alice", "would dangle")
        .unwrap_err();
    let conflicts = err.conflicts();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::MissingReference);
    assert_eq!(content(&store, "MAIN", "referrer"), None);
}

#[test]
fn test_merge_between_unrelated_branches_rejected() {
    let store = store();
    let a = store.create_branch(&path("MAIN"), "a").unwrap();
    let b = store.create_branch(&path("MAIN"), "b").unwrap();
    let nested = store.create_branch(&a.path, "nested").unwrap();

    for (source, target) in [(&a.path, &b.path), (&nested.path, &path("MAIN"))] {
        assert!(matches!(
            store.merge(source, target, "alice", "unrelated"),
            Err(TermStoreError::Invalid(_))
        ));
    }
}
