//! Test fixtures and database helpers.
//!
//! Every fixture database runs on a [`FixedClock`], so "today" is the same
//! on every machine and tests can step from one day to the next.

use chrono::NaiveDate;
use liftlog_core::{
    Clock, Config, Database, Exercise, FixedClock, MuscleGroup, RecordId, SchemaRegistry,
    SetEntry, WorkoutSession,
};
use liftlog_storage::{MemoryBackend, StorageBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// The day fixture databases start on (a Monday).
pub fn default_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).expect("valid date")
}

/// Opens a database over any backend with the built-in schema.
pub fn open_on_backend(
    backend: Box<dyn StorageBackend>,
    clock: Arc<FixedClock>,
) -> liftlog_core::CoreResult<Database> {
    let clock: Arc<dyn Clock> = clock;
    Database::open_with_backend(Config::default(), backend, clock, SchemaRegistry::builtin())
}

enum Location {
    Memory(MemoryBackend),
    Dir(TempDir),
}

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The clock the database reads "today" from.
    pub clock: Arc<FixedClock>,
    location: Location,
}

impl TestDatabase {
    /// Creates a new in-memory test database on [`default_day`].
    pub fn memory() -> Self {
        Self::memory_on(default_day())
    }

    /// Creates a new in-memory test database on `day`.
    pub fn memory_on(day: NaiveDate) -> Self {
        let backend = MemoryBackend::new();
        let clock = Arc::new(FixedClock::new(day));
        let db = open_on_backend(Box::new(backend.clone()), Arc::clone(&clock))
            .expect("Failed to open in-memory database");
        Self {
            db,
            clock,
            location: Location::Memory(backend),
        }
    }

    /// Creates a new database in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let clock = Arc::new(FixedClock::new(default_day()));
        let db = open_dir(temp_dir.path(), &clock).expect("Failed to open file database");
        Self {
            db,
            clock,
            location: Location::Dir(temp_dir),
        }
    }

    /// Closes the database and opens it again over the same bytes, as a
    /// restarted process would.
    pub fn reopen(self) -> Self {
        let Self {
            db,
            clock,
            location,
        } = self;
        drop(db);

        let db = match &location {
            Location::Memory(backend) => {
                open_on_backend(Box::new(backend.clone()), Arc::clone(&clock))
            }
            Location::Dir(dir) => open_dir(dir.path(), &clock),
        }
        .expect("Failed to reopen database");
        Self {
            db,
            clock,
            location,
        }
    }

    /// The shared buffer of an in-memory database.
    pub fn backend(&self) -> Option<&MemoryBackend> {
        match &self.location {
            Location::Memory(backend) => Some(backend),
            Location::Dir(_) => None,
        }
    }

    /// Returns the database path if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        match &self.location {
            Location::Memory(_) => None,
            Location::Dir(dir) => Some(dir.path().to_path_buf()),
        }
    }

    /// Moves "today" forward by `days`.
    pub fn advance_days(&self, days: u64) -> NaiveDate {
        let day = self
            .clock
            .today()
            .checked_add_days(chrono::Days::new(days))
            .expect("date in range");
        self.clock.set_day(day);
        day
    }
}

fn open_dir(path: &Path, clock: &Arc<FixedClock>) -> liftlog_core::CoreResult<Database> {
    let clock: Arc<dyn Clock> = Arc::clone(clock) as Arc<dyn Clock>;
    Database::open_with_clock(path, Config::default(), clock)
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db)
}

/// Runs a test with a database in a temporary directory.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A small catalog: chest and back, three exercises.
    #[derive(Debug, Clone, Copy)]
    pub struct Catalog {
        /// Bench press (chest).
        pub bench: RecordId,
        /// Dumbbell fly (chest).
        pub fly: RecordId,
        /// Barbell row (back).
        pub row: RecordId,
    }

    /// Creates the `chest` and `back` groups with their exercises.
    pub fn catalog(db: &Database) -> Catalog {
        let catalog = db.catalog().expect("open database");
        catalog
            .create_muscle_group(MuscleGroup::new("chest").with_name("Chest").with_sort_order(1))
            .expect("create chest");
        catalog
            .create_muscle_group(MuscleGroup::new("back").with_name("Back").with_sort_order(2))
            .expect("create back");

        let add = |exercise: Exercise| {
            catalog
                .create_exercise(exercise)
                .expect("create exercise")
                .id
        };
        Catalog {
            bench: add(Exercise::new("Bench Press", "chest").with_alias("bench")),
            fly: add(Exercise::new("Dumbbell Fly", "chest")),
            row: add(Exercise::new("Barbell Row", "back").with_alias("row")),
        }
    }

    /// A chest session for today with bench logged.
    #[derive(Debug, Clone)]
    pub struct ChestDay {
        /// The catalog it was built on.
        pub catalog: Catalog,
        /// Today's session.
        pub session: WorkoutSession,
        /// Bench press id.
        pub bench: RecordId,
    }

    /// Builds [`catalog`], starts a chest session and logs 135x5 twice on
    /// the bench.
    pub fn chest_day(db: &Database) -> ChestDay {
        let catalog = catalog(db);
        let sessions = db.sessions().expect("open database");
        let session = sessions
            .get_or_create_today("chest")
            .expect("start session");
        sessions
            .complete_exercise(
                catalog.bench,
                vec![SetEntry::new(135.0, 5), SetEntry::new(135.0, 5)],
            )
            .expect("log bench");
        ChestDay {
            catalog,
            session,
            bench: catalog.bench,
        }
    }
}
