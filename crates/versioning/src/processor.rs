//! Conflict processors: pluggable pre-commit validation
//!
//! Every commit runs its staged diff past the configured processors before
//! anything is written. A processor returns conflicts, never errors-as-veto:
//! any returned conflict aborts the commit with `MergeConflict`, so merge
//! results and direct commits fail through the same taxonomy.

use serde_json::Value;
use std::collections::BTreeSet;

use termstore_core::error::Result;
use termstore_core::query::Query;
use termstore_core::types::{Conflict, ConflictKind};

use crate::staging::StagingArea;

/// Pre-commit validation hook over a staged diff
pub trait ConflictProcessor: Send + Sync {
    /// Stable processor name, used in logs
    fn name(&self) -> &'static str;

    /// Inspect the staged diff and report conflicts
    ///
    /// An empty vector approves the commit. Returned conflicts abort it.
    fn process(&self, staging: &StagingArea) -> Result<Vec<Conflict>>;
}

/// Outbound object-id references of one document
///
/// References live in a top-level `"references"` array of object-id strings;
/// anything else (missing field, non-array, non-string elements) contributes
/// nothing.
fn references(content: &Value) -> impl Iterator<Item = &str> {
    content
        .get("references")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Rejects commits that would leave dangling references
///
/// Checks both directions against the post-commit snapshot: every reference
/// carried by added or changed documents must resolve, and no removal may
/// strand a surviving document that still points at the removed object.
pub struct ReferenceIntegrityProcessor;

impl ReferenceIntegrityProcessor {
    /// Would `object_id` exist on the branch after this commit lands?
    fn exists_after(staging: &StagingArea, object_id: &str) -> Result<bool> {
        let diff = staging.diff();
        if diff.removed.contains_key(object_id) {
            return Ok(false);
        }
        if diff.added.contains_key(object_id) || diff.changed.contains_key(object_id) {
            return Ok(true);
        }
        Ok(staging
            .context()
            .index
            .read_on(staging.branch(), object_id, staging.base_timestamp())?
            .is_some())
    }
}

impl ConflictProcessor for ReferenceIntegrityProcessor {
    fn name(&self) -> &'static str {
        "reference-integrity"
    }

    fn process(&self, staging: &StagingArea) -> Result<Vec<Conflict>> {
        let diff = staging.diff();
        let mut conflicts = Vec::new();

        // Outbound: staged content must not point at objects absent from
        // the resulting snapshot.
        let staged_content = diff
            .added
            .iter()
            .map(|(id, content)| (id.as_str(), content))
            .chain(
                diff.changed
                    .iter()
                    .map(|(id, entry)| (id.as_str(), &entry.new)),
            );
        for (object_id, content) in staged_content {
            let targets: BTreeSet<&str> = references(content).collect();
            for target in targets {
                if !Self::exists_after(staging, target)? {
                    conflicts.push(Conflict::new(
                        object_id,
                        ConflictKind::MissingReference,
                        format!("{object_id} references missing object {target}"),
                    ));
                }
            }
        }

        // Inbound: a removal must not strand a surviving referrer.
        for removed_id in diff.removed.keys() {
            let query = Query::all().contains("references", removed_id.as_str());
            let referrers = staging.context().index.search(
                &staging.branch().path,
                &query,
                staging.base_timestamp(),
            )?;
            for referrer in referrers {
                if diff.removed.contains_key(&referrer.object_id) {
                    continue;
                }
                // A staged change may drop the reference in the same commit
                if let Some(entry) = diff.changed.get(&referrer.object_id) {
                    if !references(&entry.new).any(|r| r == removed_id) {
                        continue;
                    }
                }
                conflicts.push(
                    Conflict::new(
                        removed_id.as_str(),
                        ConflictKind::MissingReference,
                        format!(
                            "cannot remove {removed_id}: still referenced by {}",
                            referrer.object_id
                        ),
                    )
                    .with_target(referrer),
                );
            }
        }

        Ok(conflicts)
    }
}
