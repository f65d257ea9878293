//! Grouped writes.

use crate::types::{Document, RecordId};

/// One pending write.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Store a new record under a fresh id.
    Insert {
        /// Target collection.
        collection: String,
        /// Record fields.
        document: Document,
    },
    /// Merge fields into an existing record.
    Update {
        /// Target collection.
        collection: String,
        /// Record to change.
        id: RecordId,
        /// Fields to overwrite.
        changes: Document,
    },
    /// Store a record under a caller-chosen id, replacing any previous one.
    ///
    /// Timestamps already in the document are kept.
    Restore {
        /// Target collection.
        collection: String,
        /// Record identity.
        id: RecordId,
        /// Complete record.
        document: Document,
    },
    /// Remove a record.
    Delete {
        /// Target collection.
        collection: String,
        /// Record to remove.
        id: RecordId,
    },
    /// Remove every record of a collection.
    Clear {
        /// Target collection.
        collection: String,
    },
}

/// Writes committed together as one log frame: after a crash either all
/// of them are visible or none.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an insert. Its id is returned by commit, in insert order.
    pub fn insert(&mut self, collection: impl Into<String>, document: Document) -> &mut Self {
        self.ops.push(BatchOp::Insert {
            collection: collection.into(),
            document,
        });
        self
    }

    /// Queues a field merge.
    pub fn update(
        &mut self,
        collection: impl Into<String>,
        id: RecordId,
        changes: Document,
    ) -> &mut Self {
        self.ops.push(BatchOp::Update {
            collection: collection.into(),
            id,
            changes,
        });
        self
    }

    /// Queues a write with an explicit id.
    pub fn restore(
        &mut self,
        collection: impl Into<String>,
        id: RecordId,
        document: Document,
    ) -> &mut Self {
        self.ops.push(BatchOp::Restore {
            collection: collection.into(),
            id,
            document,
        });
        self
    }

    /// Queues a delete.
    pub fn delete(&mut self, collection: impl Into<String>, id: RecordId) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.into(),
            id,
        });
        self
    }

    /// Queues a clear.
    pub fn clear(&mut self, collection: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Clear {
            collection: collection.into(),
        });
        self
    }

    /// Number of queued writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
