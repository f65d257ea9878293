//! # liftlog core
//!
//! Offline data layer for a strength-training log.
//!
//! This crate provides:
//! - An append-only operation log with torn-tail recovery
//! - An entity store of JSON documents with declared secondary indexes
//! - A versioned schema registry and the migration engine that applies it
//! - The daily workout-session state machine
//! - History, personal-record and one-rep-max views over the set ledger
//! - Full-replace JSON backup export and import
//!
//! Everything is reached through [`Database`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod catalog;
mod clock;
mod collection;
mod config;
mod database;
mod dir;
mod error;
mod history;
mod log;
mod migration;
mod model;
mod one_rm;
mod schema;
mod session;
mod settings;
mod store;
mod types;

#[cfg(test)]
mod test_support;

pub use backup::{
    checksum, BackupCodec, BackupData, BackupDocument, ImportStats, BACKUP_FORMAT,
    BACKUP_FORMAT_VERSION,
};
pub use catalog::Catalog;
pub use clock::{Clock, FixedClock, SystemClock};
pub use collection::{to_document, Collection, Record, ID_FIELD};
pub use config::{Config, DEFAULT_APP_NAME};
pub use database::Database;
pub use dir::DatabaseDir;
pub use error::{CoreError, CoreResult};
pub use history::{CompletionPoint, History, PersonalRecords, TrendPoint};
pub use log::{decode_frames, encode_frame, DecodedLog, LogOp, OpLog, FRAME_MAGIC, FRAME_VERSION};
pub use migration::{AppliedMigration, MigrationEngine, MigrationReport, MigrationState};
pub use model::{
    validate_sets, Exercise, ExerciseCompletion, ExercisePatch, LedgerEntry, MuscleGroup,
    MuscleGroupPatch, RetiredIdentifier, SessionStatus, SetEntry, Settings, SettingsPatch, Theme,
    WeightUnit, WorkoutSession, MAX_REPS, MAX_WEIGHT,
};
pub use one_rm::{
    calculate_1rm, calculate_1rm_brzycki, calculate_1rm_lombardi, estimate_one_rep_max,
    Estimator,
};
pub use schema::{names, CollectionSpec, SchemaDefinition, SchemaDelta, SchemaRegistry, VersionSpec};
pub use session::{SessionDetail, SessionLifecycle};
pub use settings::SettingsStore;
pub use store::{BatchOp, EntityStore, IndexKey, WriteBatch};
pub use types::{Document, RecordId, SchemaVersion, CREATED_AT, UPDATED_AT};

/// Crate version, as recorded in Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
