//! Schema migration and log recovery through full database opens.

use liftlog_core::{
    names, Clock, Config, CoreError, Database, EntityStore, FixedClock, LogOp, MigrationEngine,
    OpLog, SchemaRegistry, SetEntry,
};
use liftlog_storage::MemoryBackend;
use liftlog_testkit::prelude::*;
use std::sync::Arc;

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(default_day()))
}

fn open_with(backend: &MemoryBackend, registry: SchemaRegistry) -> liftlog_core::CoreResult<Database> {
    let clock: Arc<dyn Clock> = clock();
    Database::open_with_backend(
        Config::default(),
        Box::new(backend.clone()),
        clock,
        registry,
    )
}

/// A bare store over `backend` migrated to `version`.
fn store_at(backend: &MemoryBackend, version: u32) {
    let clock: Arc<dyn Clock> = clock();
    let store = EntityStore::open(OpLog::new(Box::new(backend.clone()), true), clock).unwrap();
    let registry = SchemaRegistry::builtin();
    MigrationEngine::new(&store, &registry)
        .migrate_to(version)
        .unwrap();
}

fn schema_version_of(backend: &MemoryBackend) -> u32 {
    let clock: Arc<dyn Clock> = clock();
    EntityStore::open(OpLog::new(Box::new(backend.clone()), true), clock)
        .unwrap()
        .schema_version()
}

#[test]
fn reopening_a_current_database_writes_nothing() {
    let db = TestDatabase::memory();
    let latest = SchemaRegistry::builtin().current_version();
    assert_eq!(db.schema_version(), latest);
    let bytes = db.backend().unwrap().snapshot();

    let db = db.reopen();
    assert_eq!(db.schema_version(), latest);
    assert!(db.migrate().unwrap().is_noop());
    assert_eq!(db.backend().unwrap().snapshot(), bytes);
}

#[test]
fn old_store_is_upgraded_on_open() {
    let backend = MemoryBackend::new();
    store_at(&backend, 1);

    let db = open_with(&backend, SchemaRegistry::builtin()).unwrap();
    let state = db.migration_state();
    assert!(state.is_current());
    assert_eq!(
        state.applied.iter().map(|m| m.version).collect::<Vec<_>>(),
        [1, 2, 3, 4, 5]
    );
    assert!(!db.store().has_collection(names::LEGACY_SETS));
    assert!(!db.store().has_collection(names::LEGACY_WORKOUTS));
    assert!(db.store().has_collection(names::SET_ENTRIES));
}

#[test]
fn skipping_versions_matches_stepping_through_them() {
    let stepped = MemoryBackend::new();
    for version in 1..=5 {
        store_at(&stepped, version);
    }
    let jumped = MemoryBackend::new();
    store_at(&jumped, 2);

    let stepped = open_with(&stepped, SchemaRegistry::builtin()).unwrap();
    let jumped = open_with(&jumped, SchemaRegistry::builtin()).unwrap();
    assert_eq!(stepped.store().collections(), jumped.store().collections());
    for name in stepped.store().collections() {
        assert_eq!(
            stepped.store().indexes(&name).unwrap(),
            jumped.store().indexes(&name).unwrap(),
            "{name}"
        );
    }
}

#[test]
fn failed_version_stops_the_open_and_keeps_the_previous_one() {
    let backend = MemoryBackend::new();
    store_at(&backend, 2);

    // a stray collection that version 3 wants to create
    let log = OpLog::new(Box::new(backend.clone()), true);
    log.recover().unwrap();
    log.append(&[LogOp::CreateCollection {
        name: names::SET_ENTRIES.into(),
        indexes: vec![],
    }])
    .unwrap();

    let err = open_with(&backend, SchemaRegistry::builtin()).unwrap_err();
    assert!(matches!(err, CoreError::Migration { version: 3, .. }), "{err}");
    assert!(!err.is_recoverable());
    assert_eq!(schema_version_of(&backend), 2);
}

#[test]
fn storage_failure_during_migration_leaves_nothing_behind() {
    let memory = MemoryBackend::new();
    let (backend, control) = FaultyBackend::new(memory.clone());
    control.fail_appends(true);

    let err = open_on_backend(Box::new(backend), clock()).unwrap_err();
    assert!(matches!(err, CoreError::Migration { version: 1, .. }), "{err}");
    assert!(memory.snapshot().is_empty());

    let db = open_with(&memory, SchemaRegistry::builtin()).unwrap();
    assert!(db.migration_state().is_current());
}

#[test]
fn crash_mid_migration_resumes_from_the_last_whole_version() {
    let memory = MemoryBackend::new();
    store_at(&memory, 1);
    let written = memory.snapshot().len();

    let (backend, control) = FaultyBackend::new(memory.clone());
    // enough to get a few bytes of the version 2 frame out
    control.crash_after(12);
    assert!(open_on_backend(Box::new(backend), clock()).is_err());
    assert!(control.has_crashed());
    assert_eq!(memory.snapshot().len(), written + 12);

    let db = open_with(&memory, SchemaRegistry::builtin()).unwrap();
    assert!(db.migration_state().is_current());
    assert_eq!(db.migration_state().applied.len(), 5);
}

#[test]
fn torn_write_after_a_crash_is_discarded() {
    let memory = MemoryBackend::new();
    let (backend, control) = FaultyBackend::new(memory.clone());
    let db = open_on_backend(Box::new(backend), clock()).unwrap();
    let catalog = scenarios::catalog(&db);
    let session = db.sessions().unwrap().get_or_create_today("chest").unwrap();

    control.crash_after(20);
    let err = db
        .sessions()
        .unwrap()
        .complete_exercise(catalog.bench, vec![SetEntry::new(135.0, 5)])
        .unwrap_err();
    assert!(matches!(err, CoreError::Storage(_)));
    // the failed frame never reached memory
    assert!(!db
        .sessions()
        .unwrap()
        .is_exercise_completed_today(catalog.bench)
        .unwrap());
    drop(db);

    let db = open_on_backend(Box::new(memory), clock()).unwrap();
    let sessions = db.sessions().unwrap();
    assert_eq!(sessions.today_session().unwrap().unwrap().id, session.id);
    assert!(!sessions.is_exercise_completed_today(catalog.bench).unwrap());
    sessions
        .complete_exercise(catalog.bench, vec![SetEntry::new(135.0, 5)])
        .unwrap();
    assert!(sessions.is_exercise_completed_today(catalog.bench).unwrap());
}

#[test]
fn store_newer_than_this_build_is_refused() {
    let backend = MemoryBackend::new();
    store_at(&backend, 5);

    let full = SchemaRegistry::builtin();
    let older = SchemaRegistry::new(full.versions()[..4].to_vec()).unwrap();
    let err = open_with(&backend, older).unwrap_err();
    assert!(matches!(err, CoreError::Migration { version: 5, .. }), "{err}");
    // refusing does not touch the log
    assert_eq!(schema_version_of(&backend), 5);
}
