//! Shared fixtures for unit tests.

use crate::clock::{Clock, FixedClock};
use crate::config::Config;
use crate::database::Database;
use crate::model::{Exercise, MuscleGroup};
use crate::schema::SchemaRegistry;
use crate::types::RecordId;
use chrono::NaiveDate;
use liftlog_storage::MemoryBackend;
use std::sync::Arc;

pub(crate) fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
}

/// An in-memory database pinned to a day, with its clock and backend.
pub(crate) fn db_on(day: NaiveDate) -> (Database, Arc<FixedClock>, MemoryBackend) {
    let clock = Arc::new(FixedClock::new(day));
    let backend = MemoryBackend::new();
    let shared: Arc<dyn Clock> = clock.clone();
    let db = Database::open_with_backend(
        Config::default(),
        Box::new(backend.clone()),
        shared,
        SchemaRegistry::builtin(),
    )
    .unwrap();
    (db, clock, backend)
}

/// Chest group with a bench press; returns the exercise id.
pub(crate) fn seed_chest(db: &Database) -> RecordId {
    let catalog = db.catalog().unwrap();
    catalog
        .create_muscle_group(MuscleGroup::new("chest").with_name("Chest"))
        .unwrap();
    catalog
        .create_exercise(Exercise::new("Bench Press", "chest").with_alias("bench"))
        .unwrap()
        .id
}
