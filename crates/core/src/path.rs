//! Hierarchical branch paths
//!
//! A branch path is its identity: `MAIN`, `MAIN/task1`, `MAIN/task1/fix`.
//! Segments are separated by `/`; the root branch is `MAIN`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TermStoreError};

/// Path separator between branch segments
pub const SEPARATOR: char = '/';

/// Name of the root branch
pub const ROOT_PATH: &str = "MAIN";

/// Unique hierarchical branch name
///
/// Invariants enforced at construction:
/// - non-empty, no empty segments
/// - first segment is `MAIN`
/// - segments contain no whitespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchPath(String);

impl BranchPath {
    /// Parse and validate a full branch path
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let segments: Vec<&str> = path.split(SEPARATOR).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(TermStoreError::invalid(format!(
                "branch path has empty segment: {path:?}"
            )));
        }
        if segments[0] != ROOT_PATH {
            return Err(TermStoreError::invalid(format!(
                "branch path must start with {ROOT_PATH}: {path:?}"
            )));
        }
        if segments.iter().any(|s| s.chars().any(char::is_whitespace)) {
            return Err(TermStoreError::invalid(format!(
                "branch path contains whitespace: {path:?}"
            )));
        }
        Ok(BranchPath(path))
    }

    /// The root branch path (`MAIN`)
    pub fn root() -> Self {
        BranchPath(ROOT_PATH.to_string())
    }

    /// Child path under this branch
    pub fn child(&self, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(TermStoreError::invalid(format!(
                "invalid branch name: {name:?}"
            )));
        }
        BranchPath::new(format!("{}{}{}", self.0, SEPARATOR, name))
    }

    /// Parent path, or None for the root branch
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| BranchPath(parent.to_string()))
    }

    /// Last path segment
    pub fn name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
    }

    /// True for `MAIN`
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_PATH
    }

    /// Path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for BranchPath {
    type Err = TermStoreError;

    fn from_str(s: &str) -> Result<Self> {
        BranchPath::new(s)
    }
}
