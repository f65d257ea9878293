//! Core type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored record: field name to JSON value.
///
/// Store-managed fields (`created_at`, `updated_at`) live alongside the
/// caller's fields. The identity is kept outside the document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding the creation time (Unix millis) of every record.
pub const CREATED_AT: &str = "created_at";

/// Field holding the last-update time (Unix millis) of every record.
pub const UPDATED_AT: &str = "updated_at";

/// Identity of a stored record.
///
/// Assigned by the store on `add`, ascending across the whole database
/// and never handed out twice. Zero means "not yet stored".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True for the placeholder id of an unsaved record.
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Schema version number. Version 0 is an empty, never-migrated store.
pub type SchemaVersion = u32;
