//! Error types for liftlog core.

use crate::types::{RecordId, SchemaVersion};
use chrono::NaiveDate;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] liftlog_storage::StorageError),

    /// I/O error outside the backend (directory handling, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record or log frame could not be encoded or decoded.
    #[error("encoding error: {message}")]
    Encoding {
        /// What went wrong.
        message: String,
    },

    /// No record with this id exists in the collection.
    #[error("record {id} not found in {collection}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Missing id.
        id: RecordId,
    },

    /// Input failed validation (bounds, empty set lists, malformed import).
    #[error("validation failed: {message}")]
    Validation {
        /// Which rule was broken.
        message: String,
    },

    /// An exercise was completed with no session open for the day.
    #[error("no workout session exists for {date}")]
    NoSession {
        /// The calendar day that has no session.
        date: NaiveDate,
    },

    /// The exercise already has a completion in this session.
    #[error("exercise {exercise_id} is already completed in session {session_id}")]
    DuplicateCompletion {
        /// Owning session.
        session_id: RecordId,
        /// Exercise completed twice.
        exercise_id: RecordId,
    },

    /// A schema delta could not be applied. Fatal at startup.
    #[error("migration to version {version} failed: {message}")]
    Migration {
        /// The version that failed.
        version: SchemaVersion,
        /// Description of the failure.
        message: String,
    },

    /// The named collection does not exist at the current schema version.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// The field is not a declared index of the collection.
    #[error("no index on {collection}.{field}")]
    IndexNotFound {
        /// Collection queried.
        collection: String,
        /// Field that is not indexed.
        field: String,
    },

    /// A complete frame in the operation log failed its checksum or decode.
    #[error("log corruption at offset {offset}: {message}")]
    LogCorruption {
        /// Offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Another process holds the database directory.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database handle was closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an encoding error.
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, id: RecordId) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a migration error.
    pub fn migration(version: SchemaVersion, message: impl Into<String>) -> Self {
        Self::Migration {
            version,
            message: message.into(),
        }
    }

    /// Creates a collection-not-found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Whether the caller can report this to the user and retry with
    /// corrected input.
    ///
    /// Migration, storage and corruption failures are not recoverable:
    /// the application must stop rather than run on an inconsistent store.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Validation { .. }
                | Self::NoSession { .. }
                | Self::DuplicateCompletion { .. }
        )
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::encoding(err.to_string())
    }
}
