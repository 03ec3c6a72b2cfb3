//! Read visibility: time travel, fork isolation and shadowing

use serde_json::json;
use termstore::Query;

use crate::util::{commit, content, path, store};

#[test]
fn test_time_travel_on_one_branch() {
    let store = store();
    let first = commit(&store, "MAIN", "v1", |s| {
        s.stage_add("concept-1", json!({"v": 1})).unwrap();
    });
    let second = commit(&store, "MAIN", "v2", |s| {
        s.stage_change("concept-1", json!({"v": 2})).unwrap();
    });

    let main = path("MAIN");
    assert_eq!(
        store
            .get_object_at(&main, "concept-1", first.timestamp)
            .unwrap()
            .unwrap()
            .content,
        json!({"v": 1})
    );
    assert_eq!(
        store
            .get_object_at(&main, "concept-1", second.timestamp)
            .unwrap()
            .unwrap()
            .content,
        json!({"v": 2})
    );
    assert!(store
        .get_object_at(&main, "concept-1", first.timestamp - 1)
        .unwrap()
        .is_none());
}

#[test]
fn test_fork_isolation_both_directions() {
    let store = store();
    commit(&store, "MAIN", "before fork", |s| {
        s.stage_add("shared", json!({"v": "original"})).unwrap();
    });
    store.create_branch(&path("MAIN"), "review").unwrap();

    commit(&store, "MAIN", "parent after fork", |s| {
        s.stage_change("shared", json!({"v": "parent"})).unwrap();
        s.stage_add("parent-only", json!({})).unwrap();
    });
    commit(&store, "MAIN/review", "child work", |s| {
        s.stage_add("child-only", json!({})).unwrap();
    });

    // The child still sees the fork-point snapshot of the parent
    assert_eq!(
        content(&store, "MAIN/review", "shared"),
        Some(json!({"v": "original"}))
    );
    assert_eq!(content(&store, "MAIN/review", "parent-only"), None);
    assert_eq!(content(&store, "MAIN/review", "child-only"), Some(json!({})));

    // And the parent never sees child work
    assert_eq!(content(&store, "MAIN", "child-only"), None);
    assert_eq!(content(&store, "MAIN", "shared"), Some(json!({"v": "parent"})));
}

#[test]
fn test_child_edits_shadow_without_touching_parent() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("concept-1", json!({"v": "parent"})).unwrap();
    });
    store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "override", |s| {
        s.stage_change("concept-1", json!({"v": "child"})).unwrap();
    });

    assert_eq!(
        content(&store, "MAIN/review", "concept-1"),
        Some(json!({"v": "child"}))
    );
    assert_eq!(content(&store, "MAIN", "concept-1"), Some(json!({"v": "parent"})));
}

#[test]
fn test_tombstone_hides_inherited_object() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("concept-1", json!({"v": 1})).unwrap();
    });
    store.create_branch(&path("MAIN"), "review").unwrap();
    let removal = commit(&store, "MAIN/review", "remove inherited", |s| {
        s.stage_remove("concept-1").unwrap();
    });

    assert_eq!(content(&store, "MAIN/review", "concept-1"), None);
    assert_eq!(content(&store, "MAIN", "concept-1"), Some(json!({"v": 1})));
    // Visible again when reading before the removal
    assert!(store
        .get_object_at(&path("MAIN/review"), "concept-1", removal.timestamp - 1)
        .unwrap()
        .is_some());
}

#[test]
fn test_shadowing_across_three_levels() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("a", json!({"from": "root"})).unwrap();
        s.stage_add("b", json!({"from": "root"})).unwrap();
        s.stage_add("c", json!({"from": "root"})).unwrap();
    });
    let mid = store.create_branch(&path("MAIN"), "mid").unwrap();
    commit(&store, "MAIN/mid", "mid override", |s| {
        s.stage_change("b", json!({"from": "mid"})).unwrap();
    });
    store.create_branch(&mid.path, "leaf").unwrap();
    commit(&store, "MAIN/mid/leaf", "leaf override", |s| {
        s.stage_change("c", json!({"from": "leaf"})).unwrap();
    });

    assert_eq!(content(&store, "MAIN/mid/leaf", "a"), Some(json!({"from": "root"})));
    assert_eq!(content(&store, "MAIN/mid/leaf", "b"), Some(json!({"from": "mid"})));
    assert_eq!(content(&store, "MAIN/mid/leaf", "c"), Some(json!({"from": "leaf"})));
}

#[test]
fn test_search_respects_branch_overlay() {
    let store = store();
    commit(&store, "MAIN", "seed", |s| {
        s.stage_add("c1", json!({"status": "active", "module": "core"})).unwrap();
        s.stage_add("c2", json!({"status": "active", "module": "ext"})).unwrap();
    });
    store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "retire and add", |s| {
        s.stage_change("c2", json!({"status": "retired", "module": "ext"})).unwrap();
        s.stage_add("c3", json!({"status": "active", "module": "core"})).unwrap();
    });

    let active = Query::all().eq("status", "active");
    let on_main: Vec<String> = store
        .search(&path("MAIN"), &active, None)
        .unwrap()
        .into_iter()
        .map(|r| r.object_id)
        .collect();
    assert_eq!(on_main, vec!["c1", "c2"]);

    let mut on_review: Vec<String> = store
        .search(&path("MAIN/review"), &active, None)
        .unwrap()
        .into_iter()
        .map(|r| r.object_id)
        .collect();
    on_review.sort();
    assert_eq!(on_review, vec!["c1", "c3"]);

    // Conjunction narrows further
    let core_active = Query::all().eq("status", "active").eq("module", "core");
    let narrowed = store.search(&path("MAIN/review"), &core_active, None).unwrap();
    let mut ids: Vec<String> = narrowed.into_iter().map(|r| r.object_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["c1", "c3"]);
}

#[test]
fn test_search_as_of_past_timestamp() {
    let store = store();
    let first = commit(&store, "MAIN", "one", |s| {
        s.stage_add("c1", json!({"status": "active"})).unwrap();
    });
    commit(&store, "MAIN", "two", |s| {
        s.stage_add("c2", json!({"status": "active"})).unwrap();
    });

    let active = Query::all().eq("status", "active");
    let then = store
        .search(&path("MAIN"), &active, Some(first.timestamp))
        .unwrap();
    assert_eq!(then.len(), 1);
    assert_eq!(then[0].object_id, "c1");
}

#[test]
fn test_revision_versions_count_up_per_branch() {
    let store = store();
    commit(&store, "MAIN", "v1", |s| {
        s.stage_add("concept-1", json!({"v": 1})).unwrap();
    });
    commit(&store, "MAIN", "v2", |s| {
        s.stage_change("concept-1", json!({"v": 2})).unwrap();
    });
    store.create_branch(&path("MAIN"), "review").unwrap();
    commit(&store, "MAIN/review", "v3 on branch", |s| {
        s.stage_change("concept-1", json!({"v": 3})).unwrap();
    });

    let on_main = store.get_object(&path("MAIN"), "concept-1").unwrap().unwrap();
    assert_eq!(on_main.revision_version, 2);
    let on_review = store
        .get_object(&path("MAIN/review"), "concept-1")
        .unwrap()
        .unwrap();
    assert_eq!(on_review.revision_version, 3);
    assert_eq!(on_review.branch_path, path("MAIN/review"));
}
