//! Secondary indexes.

use crate::types::RecordId;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeBounds;

/// A value that can be looked up through an index.
///
/// Only booleans, integers and strings are indexed. Records whose field is
/// missing, null, fractional, or structured are simply absent from the
/// index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Boolean field.
    Bool(bool),
    /// Integer field (ids, timestamps, sort orders).
    Int(i64),
    /// String field (dates are stored as `YYYY-MM-DD`, so they sort).
    Text(String),
}

impl IndexKey {
    /// Extracts a key from a document value.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Self::Int).or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| Self::Int(f as i64))
            }),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for IndexKey {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for IndexKey {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<RecordId> for IndexKey {
    fn from(id: RecordId) -> Self {
        Self::Int(i64::try_from(id.as_u64()).unwrap_or(i64::MAX))
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Ordered index over one field of one collection.
#[derive(Debug, Default, Clone)]
pub(crate) struct FieldIndex {
    entries: BTreeMap<IndexKey, BTreeSet<RecordId>>,
}

impl FieldIndex {
    pub(crate) fn insert(&mut self, key: IndexKey, id: RecordId) {
        self.entries.entry(key).or_default().insert(id);
    }

    pub(crate) fn remove(&mut self, key: &IndexKey, id: RecordId) {
        if let Some(ids) = self.entries.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// Ids with exactly `key`, ascending.
    pub(crate) fn lookup(&self, key: &IndexKey) -> Vec<RecordId> {
        self.entries
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids with a key in `range`, by key then id.
    pub(crate) fn range<R: RangeBounds<IndexKey>>(&self, range: R) -> Vec<RecordId> {
        self.entries
            .range(range)
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn distinct_keys(&self) -> usize {
        self.entries.len()
    }
}
