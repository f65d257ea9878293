//! # liftlog storage
//!
//! Byte-level backends underneath the liftlog operation log.
//!
//! A backend only knows how to append bytes, read them back and cut the
//! tail off. Frame layout, checksums and record encoding all live in
//! `liftlog_core`; nothing here interprets the bytes it holds.
//!
//! ## Backends
//!
//! - [`MemoryBackend`] - ephemeral buffer, cloneable handle for tests
//! - [`FileBackend`] - a single file on the local filesystem
//!
//! ## Example
//!
//! ```rust
//! use liftlog_storage::{MemoryBackend, StorageBackend};
//!
//! let mut backend = MemoryBackend::new();
//! let offset = backend.append(b"bench 135x5").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"bench");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
