//! Operation log.
//!
//! Every mutation of the store is appended here as one frame before it is
//! applied in memory. Opening a database replays the log from the start.

mod record;

pub use record::{decode_frames, encode_frame, DecodedLog, LogOp, FRAME_MAGIC, FRAME_VERSION};

use crate::error::CoreResult;
use liftlog_storage::StorageBackend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Append-only frame log over a storage backend.
pub struct OpLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_write: bool,
    frames: AtomicUsize,
}

impl OpLog {
    /// Wraps a backend. Call [`Self::recover`] before appending.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_write,
            frames: AtomicUsize::new(0),
        }
    }

    /// Reads every complete frame.
    ///
    /// A torn frame at the tail (the process died mid-append) is cut off
    /// so later appends start on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or a complete frame
    /// is corrupt.
    pub fn recover(&self) -> CoreResult<Vec<Vec<LogOp>>> {
        let mut backend = self.backend.lock();
        let data = backend.read_all()?;
        let total = data.len() as u64;
        let decoded = decode_frames(&data)?;

        if decoded.has_torn_tail(total) {
            tracing::warn!(
                valid = decoded.valid_len,
                discarded = total - decoded.valid_len,
                "discarding torn frame at end of operation log"
            );
            backend.truncate(decoded.valid_len)?;
            backend.sync()?;
        }

        self.frames.store(decoded.frames.len(), Ordering::SeqCst);
        Ok(decoded.frames)
    }

    /// Appends a batch as one frame and returns its offset.
    ///
    /// If the write fails part-way the partial frame is rolled back when
    /// the backend allows it; otherwise recovery discards it on next open.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn append(&self, ops: &[LogOp]) -> CoreResult<u64> {
        let frame = encode_frame(ops)?;
        let mut backend = self.backend.lock();
        let start = backend.size()?;

        let written = backend.append(&frame).and_then(|offset| {
            if self.sync_on_write {
                backend.sync()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => {
                self.frames.fetch_add(1, Ordering::SeqCst);
                Ok(offset)
            }
            Err(err) => {
                if let Err(rollback) = backend.truncate(start) {
                    tracing::warn!(error = %rollback, "could not roll back partial frame");
                }
                Err(err.into())
            }
        }
    }

    /// Forces appended frames to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Number of frames replayed or appended since open.
    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    /// Rewrites the log in place as a single frame.
    ///
    /// Not crash-safe: used for backends that cannot be swapped atomically
    /// (in-memory stores).
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any write fails.
    pub fn rewrite_in_place(&self, ops: &[LogOp]) -> CoreResult<()> {
        let frame = encode_frame(ops)?;
        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        backend.append(&frame)?;
        backend.sync()?;
        self.frames.store(1, Ordering::SeqCst);
        Ok(())
    }

    /// Swaps in a backend that already holds a rewritten log.
    pub fn replace_backend(&self, backend: Box<dyn StorageBackend>, frames: usize) {
        *self.backend.lock() = backend;
        self.frames.store(frames, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftlog_storage::MemoryBackend;

    fn reserve(next_id: u64) -> LogOp {
        LogOp::ReserveIds { next_id }
    }

    #[test]
    fn append_then_recover() {
        let backend = MemoryBackend::new();
        let log = OpLog::new(Box::new(backend.clone()), true);
        log.append(&[reserve(1)]).unwrap();
        log.append(&[reserve(2), reserve(3)]).unwrap();
        assert_eq!(log.frame_count(), 2);

        let reopened = OpLog::new(Box::new(backend), true);
        let frames = reopened.recover().unwrap();
        assert_eq!(frames, vec![vec![reserve(1)], vec![reserve(2), reserve(3)]]);
        assert_eq!(reopened.frame_count(), 2);
    }

    #[test]
    fn recover_truncates_torn_tail() {
        let backend = MemoryBackend::new();
        let log = OpLog::new(Box::new(backend.clone()), true);
        log.append(&[reserve(1)]).unwrap();
        let good = log.size().unwrap();

        let torn = encode_frame(&[reserve(2)]).unwrap();
        let mut image = backend.snapshot();
        image.extend_from_slice(&torn[..torn.len() / 2]);
        let damaged = MemoryBackend::with_data(image);

        let reopened = OpLog::new(Box::new(damaged.clone()), true);
        let frames = reopened.recover().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(damaged.snapshot().len() as u64, good);

        // appends after recovery land on a frame boundary
        reopened.append(&[reserve(5)]).unwrap();
        let again = OpLog::new(Box::new(damaged), true);
        assert_eq!(again.recover().unwrap().len(), 2);
    }

    #[test]
    fn rewrite_in_place_collapses_frames() {
        let backend = MemoryBackend::new();
        let log = OpLog::new(Box::new(backend.clone()), false);
        for i in 0..5 {
            log.append(&[reserve(i)]).unwrap();
        }
        log.rewrite_in_place(&[reserve(9)]).unwrap();
        assert_eq!(log.frame_count(), 1);

        let reopened = OpLog::new(Box::new(backend), false);
        assert_eq!(reopened.recover().unwrap(), vec![vec![reserve(9)]]);
    }
}
