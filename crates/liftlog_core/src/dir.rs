//! Database directory management.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ <app>.log         # Operation log
//! └─ <app>.log.tmp     # Compaction output, only while compacting
//! ```
//!
//! The LOCK file ensures only one process can write to the database at a
//! time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// Holds the directory lock and knows where the log lives.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    log_name: String,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool, log_name: &str) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_operation(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_operation(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        // leftover from a compaction that died before its rename
        let temp = path.join(format!("{log_name}.tmp"));
        if temp.exists() {
            tracing::warn!(path = %temp.display(), "removing stale compaction file");
            fs::remove_file(&temp)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            log_name: log_name.to_string(),
            _lock_file: lock_file,
        })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the operation log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(&self.log_name)
    }

    fn temp_log_path(&self) -> PathBuf {
        self.path.join(format!("{}.tmp", self.log_name))
    }

    /// Checks if no log has been written yet.
    #[must_use]
    pub fn is_new_database(&self) -> bool {
        !self.log_path().exists()
    }

    /// Replaces the log with `contents` atomically.
    ///
    /// Write-then-rename:
    /// 1. Write to temporary file
    /// 2. Sync temporary file to disk
    /// 3. Rename temporary file over the log
    /// 4. Fsync the directory so the rename is durable
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails; the old log is then untouched.
    pub fn install_log(&self, contents: &[u8]) -> CoreResult<()> {
        let temp_path = self.temp_log_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.log_path())?;
        self.sync_directory()?;
        Ok(())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        // NTFS journals metadata; directories cannot be fsynced
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join("new_db");
        let dir = DatabaseDir::open(&db_path, true, "liftlog.log").unwrap();
        assert!(db_path.is_dir());
        assert!(dir.is_new_database());
        assert_eq!(dir.log_path(), db_path.join("liftlog.log"));
    }

    #[test]
    fn open_fails_if_missing_and_no_create() {
        let temp = tempdir().unwrap();
        let result = DatabaseDir::open(&temp.path().join("absent"), false, "liftlog.log");
        assert!(result.is_err());
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _first = DatabaseDir::open(temp.path(), true, "liftlog.log").unwrap();
        let second = DatabaseDir::open(temp.path(), true, "liftlog.log");
        assert!(matches!(second, Err(CoreError::DatabaseLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(DatabaseDir::open(temp.path(), true, "liftlog.log").unwrap());
        assert!(DatabaseDir::open(temp.path(), true, "liftlog.log").is_ok());
    }

    #[test]
    fn install_log_replaces_contents() {
        let temp = tempdir().unwrap();
        let dir = DatabaseDir::open(temp.path(), true, "liftlog.log").unwrap();
        fs::write(dir.log_path(), b"old contents").unwrap();

        dir.install_log(b"new").unwrap();
        assert_eq!(fs::read(dir.log_path()).unwrap(), b"new");
        assert!(!temp.path().join("liftlog.log.tmp").exists());
    }

    #[test]
    fn stale_temp_file_is_removed() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("liftlog.log.tmp"), b"half").unwrap();
        DatabaseDir::open(temp.path(), true, "liftlog.log").unwrap();
        assert!(!temp.path().join("liftlog.log.tmp").exists());
    }
}
