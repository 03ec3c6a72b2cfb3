//! Engine configuration limits
//!
//! Guard rails checked at staging/commit time. Defaults are generous; they
//! exist to fail fast on runaway callers, not to tune behavior.

use serde::{Deserialize, Serialize};

/// Default cap on staged changes per transaction
pub const DEFAULT_MAX_STAGED_CHANGES: usize = 100_000;

/// Default cap on branch nesting depth
pub const DEFAULT_MAX_BRANCH_DEPTH: usize = 64;

/// Tunable limits for the versioning engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Maximum object ids one staging area may touch
    pub max_staged_changes: usize,
    /// Maximum ancestry depth when creating a branch
    pub max_branch_depth: usize,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        VersioningConfig {
            max_staged_changes: DEFAULT_MAX_STAGED_CHANGES,
            max_branch_depth: DEFAULT_MAX_BRANCH_DEPTH,
        }
    }
}

impl VersioningConfig {
    /// Validate the configuration values
    ///
    /// # Errors
    ///
    /// Returns an error message if any limit is zero.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_staged_changes == 0 {
            return Err("max_staged_changes must be greater than zero".to_string());
        }
        if self.max_branch_depth == 0 {
            return Err("max_branch_depth must be greater than zero".to_string());
        }
        Ok(())
    }
}
