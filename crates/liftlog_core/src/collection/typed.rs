//! Typed collection implementation.

use super::record::{to_document, Record};
use crate::error::{CoreError, CoreResult};
use crate::store::{EntityStore, IndexKey, WriteBatch};
use crate::types::{Document, RecordId};
use serde::Serialize;
use std::marker::PhantomData;
use std::ops::RangeBounds;

/// A typed view of one collection.
///
/// `Collection<T>` decodes documents into `T` on the way out and encodes
/// them on the way in. Filtering beyond the declared indexes is done with
/// iterator adapters on [`Self::all`].
pub struct Collection<'a, T: Record> {
    store: &'a EntityStore,
    _marker: PhantomData<T>,
}

impl<'a, T: Record> Collection<'a, T> {
    /// Creates a typed view over `store`.
    pub fn new(store: &'a EntityStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &'static str {
        T::COLLECTION
    }

    /// Validates and inserts a record, writing back its new id and
    /// timestamps.
    ///
    /// # Errors
    ///
    /// Returns a validation or storage error.
    pub fn insert(&self, record: &mut T) -> CoreResult<RecordId> {
        record.validate()?;
        let id = self.store.add(T::COLLECTION, record.to_document()?)?;
        *record = self.require(id)?;
        Ok(id)
    }

    /// Queues an insert of `record` on `batch`.
    ///
    /// # Errors
    ///
    /// Returns a validation or encoding error.
    pub fn insert_in_batch(&self, batch: &mut WriteBatch, record: &T) -> CoreResult<()> {
        record.validate()?;
        batch.insert(T::COLLECTION, record.to_document()?);
        Ok(())
    }

    /// Gets a record by id.
    ///
    /// Returns `None` if it doesn't exist.
    pub fn get(&self, id: RecordId) -> CoreResult<Option<T>> {
        self.store
            .get(T::COLLECTION, id)?
            .map(|doc| T::from_document(id, doc))
            .transpose()
    }

    /// Gets a record that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if it doesn't.
    pub fn require(&self, id: RecordId) -> CoreResult<T> {
        self.get(id)?
            .ok_or_else(|| CoreError::not_found(T::COLLECTION, id))
    }

    /// Checks if a record exists.
    pub fn exists(&self, id: RecordId) -> CoreResult<bool> {
        self.store.contains(T::COLLECTION, id)
    }

    /// Merges `patch` (any struct serializing to an object, usually of
    /// optional fields) into a record, validates the result and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] or a validation error.
    pub fn update<P: Serialize + ?Sized>(&self, id: RecordId, patch: &P) -> CoreResult<T> {
        let changes = to_document(patch)?;
        let mut merged = self
            .store
            .get(T::COLLECTION, id)?
            .ok_or_else(|| CoreError::not_found(T::COLLECTION, id))?;
        merged.extend(changes.clone());
        T::from_document(id, merged)?.validate()?;

        let stored = self.store.update(T::COLLECTION, id, changes)?;
        T::from_document(id, stored)
    }

    /// Overwrites a stored record with `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] or a validation error.
    pub fn save(&self, record: &T) -> CoreResult<T> {
        record.validate()?;
        let stored = self
            .store
            .update(T::COLLECTION, record.id(), record.to_document()?)?;
        T::from_document(record.id(), stored)
    }

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if it doesn't exist.
    pub fn delete(&self, id: RecordId) -> CoreResult<()> {
        self.store.delete(T::COLLECTION, id)
    }

    /// Returns the number of records.
    pub fn count(&self) -> CoreResult<usize> {
        self.store.count(T::COLLECTION)
    }

    /// Every record in id order.
    ///
    /// **Warning**: This is a full scan.
    pub fn all(&self) -> CoreResult<Vec<T>> {
        decode_all(self.store.scan(T::COLLECTION)?)
    }

    /// Records whose indexed `field` equals `key`, in id order.
    pub fn find_by(&self, field: &str, key: impl Into<IndexKey>) -> CoreResult<Vec<T>> {
        decode_all(self.store.find_by(T::COLLECTION, field, key)?)
    }

    /// Records whose indexed `field` is in `range`, by key then id.
    pub fn range<R: RangeBounds<IndexKey>>(&self, field: &str, range: R) -> CoreResult<Vec<T>> {
        decode_all(self.store.range(T::COLLECTION, field, range)?)
    }
}

fn decode_all<T: Record>(rows: Vec<(RecordId, Document)>) -> CoreResult<Vec<T>> {
    rows.into_iter()
        .map(|(id, doc)| T::from_document(id, doc))
        .collect()
}
