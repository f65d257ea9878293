//! Database configuration.

use crate::one_rm::Estimator;

/// Application name used for the log file when none is configured.
pub const DEFAULT_APP_NAME: &str = "liftlog";

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the log after every frame (safer but slower).
    pub sync_on_write: bool,

    /// Fixed application name; the log file is `<app_name>.log`.
    pub app_name: String,

    /// 1RM formula used by the aggregator when the caller doesn't pick one.
    pub estimator: Estimator,

    /// Number of ledger entries returned by history views by default.
    pub history_limit: usize,

    /// Rewrite the log as a snapshot on open once it holds this many
    /// frames (0 = never).
    pub compact_after_frames: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            app_name: DEFAULT_APP_NAME.to_string(),
            estimator: Estimator::Epley,
            history_limit: 20,
            compact_after_frames: 10_000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log after every frame.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the application name.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sets the default 1RM estimator.
    #[must_use]
    pub const fn estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Sets the default history length.
    #[must_use]
    pub const fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Sets the frame count that triggers compaction on open.
    #[must_use]
    pub const fn compact_after_frames(mut self, frames: usize) -> Self {
        self.compact_after_frames = frames;
        self
    }

    /// File name of the operation log.
    #[must_use]
    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.app_name)
    }
}
