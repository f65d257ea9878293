//! Database facade and startup.

use crate::backup::{BackupCodec, ImportStats};
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::history::History;
use crate::log::{encode_frame, OpLog};
use crate::migration::{MigrationEngine, MigrationReport, MigrationState};
use crate::schema::SchemaRegistry;
use crate::session::SessionLifecycle;
use crate::settings::SettingsStore;
use crate::store::{EntityStore, WriteBatch};
use crate::types::SchemaVersion;
use liftlog_storage::{FileBackend, MemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;

/// The main database handle.
///
/// Opening a database replays its operation log, brings the schema up to
/// date and checks the result against the registry. Once open, the handle
/// hands out the per-concern views:
///
/// - [`Database::catalog`] for muscle groups and exercises
/// - [`Database::sessions`] for today's session and completions
/// - [`Database::history`] for history and personal records
/// - [`Database::settings`] for the settings singleton
///
/// ```rust,ignore
/// use liftlog_core::{Database, MuscleGroup};
///
/// let db = Database::open_in_memory()?;
/// db.catalog()?.create_muscle_group(MuscleGroup::new("chest"))?;
/// let session = db.sessions()?.get_or_create_today("chest")?;
/// ```
pub struct Database {
    config: Config,
    /// Holds the directory lock. None for in-memory databases.
    dir: Option<DatabaseDir>,
    registry: SchemaRegistry,
    store: EntityStore,
    session_lock: Mutex<()>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens or creates a database in a directory with the default config.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the database locked (`DatabaseLocked`)
    /// - A complete log frame is corrupt (`LogCorruption`)
    /// - The schema cannot be brought up to date (`Migration`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database in a directory with a custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        Self::open_with_clock(path, config, Arc::new(SystemClock))
    }

    /// Opens a database in a directory with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open_with_clock(path: &Path, config: Config, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing, &config.log_file_name())?;
        let backend = FileBackend::open(&dir.log_path())?;
        tracing::info!(path = %path.display(), "opening database");
        Self::open_inner(
            config,
            Some(dir),
            Box::new(backend),
            clock,
            SchemaRegistry::builtin(),
        )
    }

    /// Opens a throwaway database that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial migration fails.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(
            Config::default(),
            Box::new(MemoryBackend::new()),
            Arc::new(SystemClock),
            SchemaRegistry::builtin(),
        )
    }

    /// Opens a database over any backend, clock and schema history.
    ///
    /// Compaction rewrites such a log in place rather than by rename.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open_with_backend(
        config: Config,
        backend: Box<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        registry: SchemaRegistry,
    ) -> CoreResult<Self> {
        Self::open_inner(config, None, backend, clock, registry)
    }

    fn open_inner(
        config: Config,
        dir: Option<DatabaseDir>,
        backend: Box<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
        registry: SchemaRegistry,
    ) -> CoreResult<Self> {
        let log = OpLog::new(backend, config.sync_on_write);
        let store = EntityStore::open(log, clock)?;

        let engine = MigrationEngine::new(&store, &registry);
        let report = engine.ensure_current()?;
        engine.verify()?;

        let db = Self {
            config,
            dir,
            registry,
            store,
            session_lock: Mutex::new(()),
            is_open: RwLock::new(true),
        };

        let threshold = db.config.compact_after_frames;
        if threshold > 0 && db.store.log_frames() >= threshold {
            db.compact()?;
        }

        tracing::info!(
            schema_version = db.store.schema_version(),
            migrated = report.applied.len(),
            frames = db.store.log_frames(),
            "database open"
        );
        Ok(db)
    }

    /// Syncs the log and marks the handle closed. Closing twice is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the final sync fails.
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }
        self.store.close()?;
        *is_open = false;
        tracing::debug!("database closed");
        Ok(())
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory of a file-backed database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(DatabaseDir::path)
    }

    /// The underlying entity store.
    #[must_use]
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Schema history this database was opened with.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Muscle groups and exercises.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`Database::close`].
    pub fn catalog(&self) -> CoreResult<Catalog<'_>> {
        self.ensure_open()?;
        Ok(Catalog::new(&self.store))
    }

    /// Today's session and its completions.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`Database::close`].
    pub fn sessions(&self) -> CoreResult<SessionLifecycle<'_>> {
        self.ensure_open()?;
        Ok(SessionLifecycle::new(&self.store, &self.session_lock))
    }

    /// History queries using the configured estimator and history length.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`Database::close`].
    pub fn history(&self) -> CoreResult<History<'_>> {
        self.ensure_open()?;
        Ok(History::new(
            &self.store,
            self.config.estimator,
            self.config.history_limit,
        ))
    }

    /// The settings singleton.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DatabaseClosed`] after [`Database::close`].
    pub fn settings(&self) -> CoreResult<SettingsStore<'_>> {
        self.ensure_open()?;
        Ok(SettingsStore::new(&self.store))
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Stored schema version.
    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        self.store.schema_version()
    }

    /// Applied and pending schema versions.
    #[must_use]
    pub fn migration_state(&self) -> MigrationState {
        MigrationEngine::new(&self.store, &self.registry).state()
    }

    /// Brings the schema up to date. A no-op after a successful open.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] if a version fails to apply.
    pub fn migrate(&self) -> CoreResult<MigrationReport> {
        self.ensure_open()?;
        MigrationEngine::new(&self.store, &self.registry).ensure_current()
    }

    // ========================================================================
    // Backup and maintenance
    // ========================================================================

    /// Serializes every collection as backup text.
    ///
    /// # Errors
    ///
    /// Returns a storage or encoding error.
    pub fn export_backup(&self) -> CoreResult<String> {
        self.ensure_open()?;
        BackupCodec::new(&self.store).export()
    }

    /// Replaces all data with the contents of backup text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a bad document; the store is
    /// then unchanged.
    pub fn import_backup(&self, text: &str) -> CoreResult<ImportStats> {
        self.ensure_open()?;
        let _guard = self.session_lock.lock();
        BackupCodec::new(&self.store).import(text)
    }

    /// Deletes every record of every collection in one write. The schema
    /// and migration history stay.
    ///
    /// # Errors
    ///
    /// Returns a storage error; nothing is cleared in that case.
    pub fn clear_all_data(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let _guard = self.session_lock.lock();
        let mut batch = WriteBatch::new();
        for name in self.store.collections() {
            batch.clear(name);
        }
        self.store.commit(batch)?;
        tracing::info!("cleared all data");
        Ok(())
    }

    /// Rewrites the log as a single snapshot frame.
    ///
    /// For a directory the snapshot is written beside the log and renamed
    /// over it, so a crash leaves either the old or the new log.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written; the old log is
    /// then still in use.
    pub fn compact(&self) -> CoreResult<()> {
        self.ensure_open()?;
        let before = self.store.log_size()?;
        let frames = self.store.log_frames();

        self.store.compact_with(|log, ops| match &self.dir {
            Some(dir) => {
                dir.install_log(&encode_frame(&ops)?)?;
                let backend = FileBackend::open(&dir.log_path())?;
                log.replace_backend(Box::new(backend), 1);
                Ok(())
            }
            None => log.rewrite_in_place(&ops),
        })?;

        tracing::info!(
            frames,
            before,
            after = self.store.log_size()?,
            "compacted operation log"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("is_open", &self.is_open())
            .field("schema_version", &self.schema_version())
            .field("log_frames", &self.store.log_frames())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{Exercise, MuscleGroup, SetEntry, SettingsPatch, Theme};
    use crate::schema::names;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn memory_db(backend: &MemoryBackend, config: Config) -> Database {
        Database::open_with_backend(
            config,
            Box::new(backend.clone()),
            Arc::new(FixedClock::new(day())),
            SchemaRegistry::builtin(),
        )
        .unwrap()
    }

    fn seed(db: &Database) {
        let catalog = db.catalog().unwrap();
        catalog
            .create_muscle_group(MuscleGroup::new("chest"))
            .unwrap();
        let bench = catalog
            .create_exercise(Exercise::new("Bench Press", "chest"))
            .unwrap();
        let sessions = db.sessions().unwrap();
        sessions.get_or_create_today("chest").unwrap();
        sessions
            .complete_exercise(bench.id, vec![SetEntry::new(135.0, 5)])
            .unwrap();
    }

    #[test]
    fn open_in_memory_is_current() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.is_open());
        assert_eq!(db.schema_version(), db.registry().current_version());
        assert!(db.migration_state().is_current());
        assert!(db.path().is_none());
        assert!(db.store().has_collection(names::SET_ENTRIES));
    }

    #[test]
    fn closed_database_rejects_operations() {
        let db = Database::open_in_memory().unwrap();
        db.close().unwrap();
        assert!(!db.is_open());
        assert!(matches!(db.catalog(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.export_backup(), Err(CoreError::DatabaseClosed)));
        // closing again is harmless
        db.close().unwrap();
    }

    #[test]
    fn views_taken_before_close_stop_writing() {
        let backend = MemoryBackend::new();
        let db = memory_db(&backend, Config::default());
        seed(&db);
        let catalog = db.catalog().unwrap();
        let settings = db.settings().unwrap();
        let frames = db.store().log_frames();

        db.close().unwrap();
        let err = catalog
            .create_muscle_group(MuscleGroup::new("back"))
            .unwrap_err();
        assert!(matches!(err, CoreError::DatabaseClosed));
        assert!(matches!(
            settings.update(&SettingsPatch {
                theme: Some(Theme::Dark),
                ..SettingsPatch::default()
            }),
            Err(CoreError::DatabaseClosed)
        ));
        assert_eq!(db.store().log_frames(), frames);
        // reads still work
        assert!(catalog.muscle_group_by_identifier("chest").unwrap().is_some());
    }

    #[test]
    fn reopen_memory_backend_keeps_data() {
        let backend = MemoryBackend::new();
        {
            let db = memory_db(&backend, Config::default());
            seed(&db);
        }
        let db = memory_db(&backend, Config::default());
        let sessions = db.sessions().unwrap();
        assert_eq!(sessions.today_completions().unwrap().len(), 1);
        assert!(db.migrate().unwrap().is_noop());
    }

    #[test]
    fn clear_all_data_keeps_schema() {
        let backend = MemoryBackend::new();
        let db = memory_db(&backend, Config::default());
        seed(&db);
        db.clear_all_data().unwrap();

        for name in db.store().collections() {
            assert_eq!(db.store().count(&name).unwrap(), 0, "{name}");
        }
        assert_eq!(db.schema_version(), 5);
        assert!(db.sessions().unwrap().today_session().unwrap().is_none());
    }

    #[test]
    fn compact_in_memory_preserves_image() {
        let backend = MemoryBackend::new();
        let db = memory_db(&backend, Config::default());
        seed(&db);
        let before = db.export_backup().unwrap();
        let next_id = db.store().next_id();
        assert!(db.store().log_frames() > 1);

        db.compact().unwrap();
        assert_eq!(db.store().log_frames(), 1);
        drop(db);

        let db = memory_db(&backend, Config::default());
        assert_eq!(db.store().next_id(), next_id);
        assert_eq!(db.migration_state().applied.len(), 5);
        let export = db.export_backup().unwrap();
        let strip = |text: &str| {
            let mut doc: serde_json::Value = serde_json::from_str(text).unwrap();
            doc.as_object_mut().unwrap().remove("exported_at");
            doc
        };
        assert_eq!(strip(&before), strip(&export));
    }

    #[test]
    fn compacts_on_open_past_threshold() {
        let backend = MemoryBackend::new();
        {
            let db = memory_db(&backend, Config::default());
            seed(&db);
        }
        let db = memory_db(&backend, Config::default().compact_after_frames(2));
        assert_eq!(db.store().log_frames(), 1);
        assert_eq!(db.sessions().unwrap().today_completions().unwrap().len(), 1);
    }

    #[test]
    fn file_database_survives_reopen_and_compaction() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db");
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(day()));
        {
            let db = Database::open_with_clock(&path, Config::default(), clock.clone()).unwrap();
            seed(&db);
            db.compact().unwrap();
            // writes after compaction land in the new log
            db.catalog()
                .unwrap()
                .create_muscle_group(MuscleGroup::new("back"))
                .unwrap();
        }
        assert!(!path.join("liftlog.log.tmp").exists());

        let db = Database::open_with_clock(&path, Config::default(), clock).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert_eq!(db.catalog().unwrap().muscle_groups().unwrap().len(), 2);
        assert_eq!(db.sessions().unwrap().today_completions().unwrap().len(), 1);
    }

    #[test]
    fn second_open_of_directory_is_locked() {
        let temp = TempDir::new().unwrap();
        let _db = Database::open(temp.path()).unwrap();
        let second = Database::open(temp.path());
        assert!(matches!(second, Err(CoreError::DatabaseLocked)));
    }
}
