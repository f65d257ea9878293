//! Backup export and import.
//!
//! ## Backup Format
//!
//! One pretty-printed JSON document:
//!
//! ```text
//! {
//!   "format": "liftlog-backup",
//!   "format_version": 1,
//!   "schema_version": 5,
//!   "exported_at": "2024-05-20T18:03:11.120+00:00",
//!   "checksum": "<hex sha-256 of compact `data`>",
//!   "data": { "<collection>": [ { "id": 1, ... }, ... ], ... }
//! }
//! ```
//!
//! Import is a full replace. The document is checked completely before
//! anything is cleared, and the clear plus all inserts are one log frame.

use crate::collection::{Record, ID_FIELD};
use crate::error::{CoreError, CoreResult};
use crate::model::{
    Exercise, ExerciseCompletion, LedgerEntry, MuscleGroup, RetiredIdentifier, Settings,
    WorkoutSession,
};
use crate::store::{EntityStore, WriteBatch};
use crate::types::{Document, RecordId, SchemaVersion};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Format tag of backup documents.
pub const BACKUP_FORMAT: &str = "liftlog-backup";

/// Current backup format version.
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Collection name to records (each with its `id`), in id order.
pub type BackupData = BTreeMap<String, Vec<Document>>;

/// A parsed backup document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    /// Always [`BACKUP_FORMAT`].
    pub format: String,
    /// Document layout version.
    pub format_version: u32,
    /// Schema version of the exporting store.
    pub schema_version: SchemaVersion,
    /// Export time, RFC 3339.
    pub exported_at: String,
    /// Hex SHA-256 of the compact serialization of `data`.
    pub checksum: String,
    /// Every collection's records.
    pub data: BackupData,
}

impl BackupDocument {
    /// Total number of records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}

/// What an import replaced the store with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Records restored per collection.
    pub collections: BTreeMap<String, usize>,
    /// Records restored in total.
    pub total: usize,
    /// Schema version the document was exported at.
    pub schema_version: SchemaVersion,
}

/// Computes the checksum of a data section.
///
/// # Errors
///
/// Returns an encoding error if the data cannot be serialized.
pub fn checksum(data: &BackupData) -> CoreResult<String> {
    let bytes = serde_json::to_vec(data)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Exports and imports the whole store.
pub struct BackupCodec<'a> {
    store: &'a EntityStore,
}

impl<'a> BackupCodec<'a> {
    /// Creates a codec over `store`.
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// Snapshot of every collection.
    ///
    /// # Errors
    ///
    /// Returns a storage or encoding error.
    pub fn export_document(&self) -> CoreResult<BackupDocument> {
        let mut data = BackupData::new();
        for name in self.store.collections() {
            let records = self
                .store
                .scan(&name)?
                .into_iter()
                .map(|(id, mut doc)| {
                    doc.insert(ID_FIELD.to_string(), Value::from(id.as_u64()));
                    doc
                })
                .collect();
            data.insert(name, records);
        }

        let now = self.store.clock().now_millis();
        let exported_at = DateTime::from_timestamp_millis(now)
            .ok_or_else(|| CoreError::encoding(format!("timestamp {now} out of range")))?
            .to_rfc3339();

        Ok(BackupDocument {
            format: BACKUP_FORMAT.to_string(),
            format_version: BACKUP_FORMAT_VERSION,
            schema_version: self.store.schema_version(),
            exported_at,
            checksum: checksum(&data)?,
            data,
        })
    }

    /// Exports the store as backup text.
    ///
    /// # Errors
    ///
    /// Returns a storage or encoding error.
    pub fn export(&self) -> CoreResult<String> {
        let document = self.export_document()?;
        let text = serde_json::to_string_pretty(&document)?;
        tracing::info!(
            records = document.record_count(),
            bytes = text.len(),
            "exported backup"
        );
        Ok(text)
    }

    /// Parses and fully checks backup text without touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] describing the first problem.
    pub fn parse(&self, text: &str) -> CoreResult<BackupDocument> {
        let document: BackupDocument = serde_json::from_str(text)
            .map_err(|e| CoreError::validation(format!("backup is not readable: {e}")))?;
        self.check(&document)?;
        Ok(document)
    }

    /// Replaces every record in the store with the backup's.
    ///
    /// Nothing is cleared unless the whole document passes validation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a bad document, or a storage
    /// error, in which case the store is unchanged.
    pub fn import(&self, text: &str) -> CoreResult<ImportStats> {
        let document = self.parse(text)?;

        let mut batch = WriteBatch::new();
        for name in self.store.collections() {
            batch.clear(name);
        }
        let mut stats = ImportStats {
            schema_version: document.schema_version,
            ..ImportStats::default()
        };
        for (name, records) in document.data {
            stats.collections.insert(name.clone(), records.len());
            stats.total += records.len();
            for mut record in records {
                let id = take_id(&name, &mut record)?;
                batch.restore(name.clone(), id, record);
            }
        }

        self.store.commit(batch)?;
        tracing::info!(
            records = stats.total,
            exported_at = %document.exported_at,
            "imported backup, previous data replaced"
        );
        Ok(stats)
    }

    fn check(&self, document: &BackupDocument) -> CoreResult<()> {
        if document.format != BACKUP_FORMAT {
            return Err(CoreError::validation(format!(
                "not a liftlog backup (format {:?})",
                document.format
            )));
        }
        if document.format_version != BACKUP_FORMAT_VERSION {
            return Err(CoreError::validation(format!(
                "unsupported backup format version {}",
                document.format_version
            )));
        }
        let store_version = self.store.schema_version();
        if document.schema_version > store_version {
            return Err(CoreError::validation(format!(
                "backup has schema version {}, this store is at {store_version}",
                document.schema_version
            )));
        }
        if checksum(&document.data)? != document.checksum {
            return Err(CoreError::validation("backup checksum does not match its data"));
        }

        let known: BTreeSet<String> = self.store.collections().into_iter().collect();
        let mut ids = BTreeSet::new();
        for (name, records) in &document.data {
            if !known.contains(name) {
                return Err(CoreError::validation(format!(
                    "backup contains unknown collection {name}"
                )));
            }
            for record in records {
                let id = record_id(name, record)?;
                if !ids.insert(id) {
                    return Err(CoreError::validation(format!(
                        "record id {id} appears more than once"
                    )));
                }
            }
        }

        let sessions: Vec<WorkoutSession> = decode_all(&document.data)?;
        let completions: Vec<ExerciseCompletion> = decode_all(&document.data)?;
        let groups: Vec<MuscleGroup> = decode_all(&document.data)?;
        let retired: Vec<RetiredIdentifier> = decode_all(&document.data)?;
        decode_all::<Exercise>(&document.data)?;
        decode_all::<LedgerEntry>(&document.data)?;
        let settings: Vec<Settings> = decode_all(&document.data)?;

        if settings.len() > 1 {
            return Err(CoreError::validation("backup holds more than one settings record"));
        }

        let retired: BTreeSet<&str> = retired.iter().map(|r| r.identifier.as_str()).collect();
        let mut identifiers: BTreeSet<&str> = BTreeSet::new();
        for group in &groups {
            if !identifiers.insert(group.identifier.as_str()) {
                return Err(CoreError::validation(format!(
                    "backup holds two muscle groups named {}",
                    group.identifier
                )));
            }
            if retired.contains(group.identifier.as_str()) {
                return Err(CoreError::validation(format!(
                    "muscle group {} uses a retired identifier",
                    group.identifier
                )));
            }
        }

        let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
        for session in &sessions {
            if !dates.insert(session.date) {
                return Err(CoreError::validation(format!(
                    "backup holds two sessions for {}",
                    session.date
                )));
            }
        }

        let session_ids: BTreeSet<RecordId> = sessions.iter().map(|s| s.id).collect();
        let mut pairs = BTreeSet::new();
        for completion in &completions {
            if !session_ids.contains(&completion.session_id) {
                return Err(CoreError::validation(format!(
                    "completion {} references missing session {}",
                    completion.id, completion.session_id
                )));
            }
            if !pairs.insert((completion.session_id, completion.exercise_id)) {
                return Err(CoreError::validation(format!(
                    "exercise {} is completed twice in session {}",
                    completion.exercise_id, completion.session_id
                )));
            }
        }
        Ok(())
    }
}

fn record_id(collection: &str, record: &Document) -> CoreResult<RecordId> {
    match record.get(ID_FIELD).and_then(Value::as_u64) {
        Some(id) if id > 0 => Ok(RecordId::new(id)),
        _ => Err(CoreError::validation(format!(
            "record in {collection} has no valid id"
        ))),
    }
}

fn take_id(collection: &str, record: &mut Document) -> CoreResult<RecordId> {
    let id = record_id(collection, record)?;
    record.remove(ID_FIELD);
    Ok(id)
}

/// Decodes and validates every record of `T`'s collection.
fn decode_all<T: Record>(data: &BackupData) -> CoreResult<Vec<T>> {
    let Some(records) = data.get(T::COLLECTION) else {
        return Ok(Vec::new());
    };
    records
        .iter()
        .map(|record| {
            let mut document = record.clone();
            let id = take_id(T::COLLECTION, &mut document)?;
            let typed = T::from_document(id, document).map_err(|e| {
                CoreError::validation(format!("invalid record in {}: {e}", T::COLLECTION))
            })?;
            typed.validate().map_err(|e| {
                CoreError::validation(format!("{} record {id}: {e}", T::COLLECTION))
            })?;
            Ok(typed)
        })
        .collect()
}
