//! # liftlog testkit
//!
//! Test utilities for liftlog.
//!
//! This crate provides:
//! - Test databases pinned to a fixed day, in memory or on disk
//! - Seeded catalog and session scenarios
//! - Property-based generators using proptest
//! - A fault-injecting storage backend for crash and I/O failure tests
//!
//! The cross-crate test suites live under `tests/`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use liftlog_testkit::prelude::*;
//!
//! #[test]
//! fn bench_day() {
//!     let db = TestDatabase::memory();
//!     let day = scenarios::chest_day(&db);
//!     assert!(db.sessions().unwrap().is_exercise_completed_today(day.bench).unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
