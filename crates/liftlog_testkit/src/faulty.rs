//! Fault injection for the storage layer.
//!
//! [`FaultyBackend`] wraps an in-memory backend and fails on command. The
//! [`FaultControl`] handle stays with the test after the backend has been
//! moved into a database, so faults can be armed mid-test. Because the
//! wrapped [`MemoryBackend`] shares its buffer, the surviving bytes can be
//! reopened with a healthy backend afterwards, just as a restarted
//! process would see them.

use liftlog_storage::{MemoryBackend, StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared switches for a [`FaultyBackend`].
#[derive(Debug)]
pub struct FaultControl {
    fail_appends: AtomicBool,
    fail_syncs: AtomicBool,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
}

impl Default for FaultControl {
    fn default() -> Self {
        Self {
            fail_appends: AtomicBool::new(false),
            fail_syncs: AtomicBool::new(false),
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }
}

impl FaultControl {
    /// Makes every append fail cleanly, writing nothing.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every sync fail.
    pub fn fail_syncs(&self, fail: bool) {
        self.fail_syncs.store(fail, Ordering::SeqCst);
    }

    /// Simulates the process dying once `bytes` more bytes have been
    /// appended: the append that crosses the limit writes a prefix and
    /// fails, and every write after it fails too, truncation included.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Clears every fault.
    pub fn reset(&self) {
        self.fail_appends.store(false, Ordering::SeqCst);
        self.fail_syncs.store(false, Ordering::SeqCst);
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
    }

    /// Whether a simulated crash has happened.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Io(io::Error::other(format!("injected fault: {what}")))
}

/// A [`MemoryBackend`] that fails when its [`FaultControl`] says so.
#[derive(Debug)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    control: Arc<FaultControl>,
}

impl FaultyBackend {
    /// Wraps `inner`. Returns the backend and its control handle.
    pub fn new(inner: MemoryBackend) -> (Self, Arc<FaultControl>) {
        let control = Arc::new(FaultControl::default());
        (
            Self {
                inner,
                control: Arc::clone(&control),
            },
            control,
        )
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let control = &self.control;
        if control.has_crashed() {
            return Err(injected("append after crash"));
        }
        if control.fail_appends.load(Ordering::SeqCst) {
            return Err(injected("append"));
        }

        let written = control.bytes_written.load(Ordering::SeqCst);
        let limit = control.crash_after_bytes.load(Ordering::SeqCst);
        if written.saturating_add(data.len()) > limit {
            let partial = limit.saturating_sub(written);
            if partial > 0 {
                self.inner.append(&data[..partial])?;
            }
            control.bytes_written.fetch_add(partial, Ordering::SeqCst);
            control.crashed.store(true, Ordering::SeqCst);
            return Err(injected("crash during append"));
        }

        let offset = self.inner.append(data)?;
        control.bytes_written.fetch_add(data.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.has_crashed() {
            return Err(injected("flush after crash"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.has_crashed() || self.control.fail_syncs.load(Ordering::SeqCst) {
            return Err(injected("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.control.has_crashed() {
            return Err(injected("truncate after crash"));
        }
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_until_armed() {
        let shared = MemoryBackend::new();
        let (mut backend, control) = FaultyBackend::new(shared.clone());
        backend.append(b"abc").unwrap();

        control.fail_appends(true);
        assert!(backend.append(b"def").is_err());
        control.fail_appends(false);
        backend.append(b"def").unwrap();
        assert_eq!(shared.snapshot(), b"abcdef");
    }

    #[test]
    fn crash_leaves_a_prefix() {
        let shared = MemoryBackend::new();
        let (mut backend, control) = FaultyBackend::new(shared.clone());
        backend.append(b"head").unwrap();

        control.crash_after(2);
        assert!(backend.append(b"tail").is_err());
        assert!(control.has_crashed());
        assert!(backend.truncate(4).is_err());
        assert!(backend.sync().is_err());
        assert_eq!(shared.snapshot(), b"headta");
    }

    #[test]
    fn failing_sync() {
        let (mut backend, control) = FaultyBackend::new(MemoryBackend::new());
        control.fail_syncs(true);
        assert!(backend.sync().is_err());
        control.reset();
        assert!(backend.sync().is_ok());
    }
}
