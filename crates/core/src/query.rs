//! Field-match query model for the document index
//!
//! The physical index is a black box that accepts a `Query` per document
//! type and returns matching ids. The model is deliberately small: exact
//! equality and array containment over dotted field paths, combined with
//! implicit AND. Ranking and query-language evaluation are out of scope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One query term over a dotted field path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// Field at `field` equals `value`
    Eq {
        /// Dotted field path, e.g. `"status"` or `"content.module"`
        field: String,
        /// Value to compare against
        value: Value,
    },
    /// Array field at `field` contains `value`
    Contains {
        /// Dotted field path to an array
        field: String,
        /// Element that must be present
        value: Value,
    },
}

impl Term {
    fn field(&self) -> &str {
        match self {
            Term::Eq { field, .. } | Term::Contains { field, .. } => field,
        }
    }

    fn matches(&self, doc: &Value) -> bool {
        match self {
            Term::Eq { field, value } => lookup(doc, field) == Some(value),
            Term::Contains { field, value } => lookup(doc, field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }

    fn with_prefix(&self, prefix: &str) -> Term {
        let prefixed = |field: &str| format!("{prefix}.{field}");
        match self {
            Term::Eq { field, value } => Term::Eq {
                field: prefixed(field),
                value: value.clone(),
            },
            Term::Contains { field, value } => Term::Contains {
                field: prefixed(field),
                value: value.clone(),
            },
        }
    }
}

/// Resolve a dotted path inside a JSON document
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| value.get(segment))
}

/// Conjunction of field-match terms
///
/// An empty query matches every document of the type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    terms: Vec<Term>,
}

impl Query {
    /// Query matching all documents
    pub fn all() -> Self {
        Query::default()
    }

    /// Add an equality term
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push(Term::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Add an array-containment term
    pub fn contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push(Term::Contains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// True if every term matches `doc`
    pub fn matches(&self, doc: &Value) -> bool {
        self.terms.iter().all(|t| t.matches(doc))
    }

    /// Same query with every field path nested under `prefix`
    ///
    /// The revision index uses this to evaluate content-level queries
    /// against revision documents, whose payload lives under `content`.
    pub fn nested_under(&self, prefix: &str) -> Query {
        Query {
            terms: self.terms.iter().map(|t| t.with_prefix(prefix)).collect(),
        }
    }

    /// Number of terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True for the match-all query
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Fields referenced by the query
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(Term::field)
    }
}
