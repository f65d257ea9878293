//! Entity store.
//!
//! Named collections of JSON documents with store-assigned ids, declared
//! secondary indexes and store-managed timestamps. Every write goes to the
//! operation log first and is applied to the in-memory image only after
//! the append succeeds, so a failed write leaves the store untouched.

mod batch;
mod index;
mod state;

pub use batch::{BatchOp, WriteBatch};
pub use index::IndexKey;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::log::{LogOp, OpLog};
use crate::migration::AppliedMigration;
use crate::types::{Document, RecordId, SchemaVersion, CREATED_AT, UPDATED_AT};
use parking_lot::RwLock;
use serde_json::Value;
use state::StoreState;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Document store backed by an operation log.
pub struct EntityStore {
    state: RwLock<StoreState>,
    log: OpLog,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl EntityStore {
    /// Replays `log` and returns the resulting store.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read or holds a corrupt frame.
    pub fn open(log: OpLog, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let frames = log.recover()?;
        let mut state = StoreState::default();
        let mut ops = 0usize;
        for frame in frames {
            ops += frame.len();
            for op in frame {
                state.apply(op);
            }
        }
        tracing::debug!(
            frames = log.frame_count(),
            ops,
            schema_version = state.schema_version,
            "replayed operation log"
        );
        Ok(Self {
            state: RwLock::new(state),
            log,
            clock,
            closed: AtomicBool::new(false),
        })
    }

    /// The clock used for timestamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Adds a record and returns its new id.
    ///
    /// `created_at` and `updated_at` are set to now.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] or a storage error.
    pub fn add(&self, collection: &str, document: Document) -> CoreResult<RecordId> {
        let mut batch = WriteBatch::new();
        batch.insert(collection, document);
        self.commit(batch)?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::invalid_operation("insert produced no id"))
    }

    /// Merges `changes` into a record and refreshes `updated_at`.
    ///
    /// Returns the record as stored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the record does not exist.
    pub fn update(&self, collection: &str, id: RecordId, changes: Document) -> CoreResult<Document> {
        let mut batch = WriteBatch::new();
        batch.update(collection, id, changes);
        self.commit(batch)?;
        self.get(collection, id)?
            .ok_or_else(|| CoreError::not_found(collection, id))
    }

    /// Removes a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the record does not exist.
    pub fn delete(&self, collection: &str, id: RecordId) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(collection, id);
        self.commit(batch).map(|_| ())
    }

    /// Removes every record of a collection. Ids are not reused.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] or a storage error.
    pub fn clear(&self, collection: &str) -> CoreResult<()> {
        let mut batch = WriteBatch::new();
        batch.clear(collection);
        self.commit(batch).map(|_| ())
    }

    /// Commits a batch as one log frame.
    ///
    /// Returns the ids assigned to inserts, in the order they were queued.
    /// Nothing is written if any op fails to resolve.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error ([`CoreError::NotFound`],
    /// [`CoreError::CollectionNotFound`], ...), a storage error, or
    /// [`CoreError::DatabaseClosed`] after [`close`](Self::close).
    pub fn commit(&self, batch: WriteBatch) -> CoreResult<Vec<RecordId>> {
        let mut state = self.state.write();
        self.ensure_writable()?;
        let (ops, ids) = self.resolve(&state, batch)?;
        Self::write(&self.log, &mut state, ops)?;
        Ok(ids)
    }

    /// Validates, logs and applies raw ops as one frame.
    pub(crate) fn commit_ops(&self, ops: Vec<LogOp>) -> CoreResult<()> {
        let mut state = self.state.write();
        self.ensure_writable()?;
        Self::write(&self.log, &mut state, ops)
    }

    /// Syncs the log and refuses every later write.
    ///
    /// Reads keep working. Closing twice is fine.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails; the store then stays writable.
    pub fn close(&self) -> CoreResult<()> {
        // holding the write lock waits out any commit in flight
        let _state = self.state.write();
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        self.log.sync()?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::DatabaseClosed)
        } else {
            Ok(())
        }
    }

    fn write(log: &OpLog, state: &mut StoreState, ops: Vec<LogOp>) -> CoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }
        state.validate(&ops)?;
        log.append(&ops)?;
        for op in ops {
            state.apply(op);
        }
        Ok(())
    }

    fn resolve(
        &self,
        state: &StoreState,
        batch: WriteBatch,
    ) -> CoreResult<(Vec<LogOp>, Vec<RecordId>)> {
        let now = self.clock.now_millis();
        let mut next_id = state.next_id;
        let mut ops = Vec::with_capacity(batch.len());
        let mut ids = Vec::new();
        let mut pending: BTreeMap<(String, RecordId), Option<Document>> = BTreeMap::new();
        let mut cleared: BTreeSet<String> = BTreeSet::new();

        let current = |pending: &BTreeMap<(String, RecordId), Option<Document>>,
                       cleared: &BTreeSet<String>,
                       collection: &str,
                       id: RecordId|
         -> CoreResult<Option<Document>> {
            if let Some(doc) = pending.get(&(collection.to_string(), id)) {
                return Ok(doc.clone());
            }
            let records = &state.collection(collection)?.records;
            if cleared.contains(collection) {
                return Ok(None);
            }
            Ok(records.get(&id).cloned())
        };

        for op in batch.into_ops() {
            match op {
                BatchOp::Insert {
                    collection,
                    mut document,
                } => {
                    state.collection(&collection)?;
                    let id = RecordId::new(next_id);
                    next_id += 1;
                    document.insert(CREATED_AT.into(), Value::from(now));
                    document.insert(UPDATED_AT.into(), Value::from(now));
                    pending.insert((collection.clone(), id), Some(document.clone()));
                    ops.push(LogOp::Put {
                        collection,
                        id,
                        document,
                    });
                    ids.push(id);
                }
                BatchOp::Update {
                    collection,
                    id,
                    changes,
                } => {
                    let mut document = current(&pending, &cleared, &collection, id)?
                        .ok_or_else(|| CoreError::not_found(collection.clone(), id))?;
                    for (field, value) in changes {
                        if field != CREATED_AT && field != UPDATED_AT {
                            document.insert(field, value);
                        }
                    }
                    document.insert(UPDATED_AT.into(), Value::from(now));
                    pending.insert((collection.clone(), id), Some(document.clone()));
                    ops.push(LogOp::Put {
                        collection,
                        id,
                        document,
                    });
                }
                BatchOp::Restore {
                    collection,
                    id,
                    mut document,
                } => {
                    state.collection(&collection)?;
                    if id.is_unassigned() {
                        return Err(CoreError::validation(format!(
                            "record in {collection} has no id"
                        )));
                    }
                    let created = document
                        .get(CREATED_AT)
                        .and_then(Value::as_i64)
                        .unwrap_or(now);
                    document.insert(CREATED_AT.into(), Value::from(created));
                    if document.get(UPDATED_AT).and_then(Value::as_i64).is_none() {
                        document.insert(UPDATED_AT.into(), Value::from(created));
                    }
                    next_id = next_id.max(id.as_u64().saturating_add(1));
                    pending.insert((collection.clone(), id), Some(document.clone()));
                    ops.push(LogOp::Put {
                        collection,
                        id,
                        document,
                    });
                }
                BatchOp::Delete { collection, id } => {
                    if current(&pending, &cleared, &collection, id)?.is_none() {
                        return Err(CoreError::not_found(collection, id));
                    }
                    pending.insert((collection.clone(), id), None);
                    ops.push(LogOp::Delete { collection, id });
                }
                BatchOp::Clear { collection } => {
                    state.collection(&collection)?;
                    pending.retain(|(c, _), _| *c != collection);
                    cleared.insert(collection.clone());
                    ops.push(LogOp::Clear { collection });
                }
            }
        }

        Ok((ops, ids))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Fetches a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] for an unknown collection.
    pub fn get(&self, collection: &str, id: RecordId) -> CoreResult<Option<Document>> {
        let state = self.state.read();
        Ok(state.collection(collection)?.records.get(&id).cloned())
    }

    /// Whether a record exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] for an unknown collection.
    pub fn contains(&self, collection: &str, id: RecordId) -> CoreResult<bool> {
        let state = self.state.read();
        Ok(state.collection(collection)?.records.contains_key(&id))
    }

    /// Number of records in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] for an unknown collection.
    pub fn count(&self, collection: &str) -> CoreResult<usize> {
        let state = self.state.read();
        Ok(state.collection(collection)?.records.len())
    }

    /// Every record in id order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] for an unknown collection.
    pub fn scan(&self, collection: &str) -> CoreResult<Vec<(RecordId, Document)>> {
        let state = self.state.read();
        Ok(state
            .collection(collection)?
            .records
            .iter()
            .map(|(id, doc)| (*id, doc.clone()))
            .collect())
    }

    /// Records whose indexed `field` equals `key`, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexNotFound`] if `field` is not indexed.
    pub fn find_by(
        &self,
        collection: &str,
        field: &str,
        key: impl Into<IndexKey>,
    ) -> CoreResult<Vec<(RecordId, Document)>> {
        let key = key.into();
        let state = self.state.read();
        let coll = state.collection(collection)?;
        let index = coll
            .indexes
            .get(field)
            .ok_or_else(|| CoreError::IndexNotFound {
                collection: collection.to_string(),
                field: field.to_string(),
            })?;
        Ok(index
            .lookup(&key)
            .into_iter()
            .filter_map(|id| coll.records.get(&id).map(|doc| (id, doc.clone())))
            .collect())
    }

    /// Records whose indexed `field` falls in `range`, ordered by key then
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IndexNotFound`] if `field` is not indexed.
    pub fn range<R: RangeBounds<IndexKey>>(
        &self,
        collection: &str,
        field: &str,
        range: R,
    ) -> CoreResult<Vec<(RecordId, Document)>> {
        let state = self.state.read();
        let coll = state.collection(collection)?;
        let index = coll
            .indexes
            .get(field)
            .ok_or_else(|| CoreError::IndexNotFound {
                collection: collection.to_string(),
                field: field.to_string(),
            })?;
        Ok(index
            .range(range)
            .into_iter()
            .filter_map(|id| coll.records.get(&id).map(|doc| (id, doc.clone())))
            .collect())
    }

    /// Names of all collections, sorted.
    pub fn collections(&self) -> Vec<String> {
        self.state.read().collections.keys().cloned().collect()
    }

    /// Whether a collection exists.
    pub fn has_collection(&self, collection: &str) -> bool {
        self.state.read().collections.contains_key(collection)
    }

    /// Indexed fields of a collection, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CollectionNotFound`] for an unknown collection.
    pub fn indexes(&self, collection: &str) -> CoreResult<Vec<String>> {
        let state = self.state.read();
        Ok(state.collection(collection)?.indexes.keys().cloned().collect())
    }

    /// Schema version recorded in the log.
    pub fn schema_version(&self) -> SchemaVersion {
        self.state.read().schema_version
    }

    /// Migrations recorded in the log, oldest first.
    pub fn applied_migrations(&self) -> Vec<AppliedMigration> {
        self.state.read().applied.clone()
    }

    /// Next id the store will hand out.
    pub fn next_id(&self) -> u64 {
        self.state.read().next_id
    }

    // ------------------------------------------------------------------
    // Log maintenance
    // ------------------------------------------------------------------

    /// Frames in the log since it was last rewritten.
    pub fn log_frames(&self) -> usize {
        self.log.frame_count()
    }

    /// Log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.size()
    }

    /// Forces the log to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.log.sync()
    }

    /// Runs `rewrite` with the log and a snapshot of the current image,
    /// blocking writers until it returns.
    pub(crate) fn compact_with<F>(&self, rewrite: F) -> CoreResult<()>
    where
        F: FnOnce(&OpLog, Vec<LogOp>) -> CoreResult<()>,
    {
        let state = self.state.write();
        self.ensure_writable()?;
        rewrite(&self.log, state.snapshot())
    }
}
