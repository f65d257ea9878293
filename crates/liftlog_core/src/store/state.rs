//! In-memory image of the store, rebuilt from the operation log.

use super::index::{FieldIndex, IndexKey};
use crate::error::{CoreError, CoreResult};
use crate::log::LogOp;
use crate::migration::AppliedMigration;
use crate::types::{Document, RecordId, SchemaVersion};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Clone)]
pub(crate) struct CollectionState {
    pub(crate) records: BTreeMap<RecordId, Document>,
    pub(crate) indexes: BTreeMap<String, FieldIndex>,
}

impl CollectionState {
    fn with_indexes(fields: &[String]) -> Self {
        Self {
            records: BTreeMap::new(),
            indexes: fields
                .iter()
                .map(|f| (f.clone(), FieldIndex::default()))
                .collect(),
        }
    }

    fn index_document(&mut self, id: RecordId, document: &Document) {
        for (field, index) in &mut self.indexes {
            if let Some(key) = document.get(field).and_then(IndexKey::from_value) {
                index.insert(key, id);
            }
        }
    }

    fn unindex_document(&mut self, id: RecordId, document: &Document) {
        for (field, index) in &mut self.indexes {
            if let Some(key) = document.get(field).and_then(IndexKey::from_value) {
                index.remove(&key, id);
            }
        }
    }

    fn put(&mut self, id: RecordId, document: Document) {
        if let Some(old) = self.records.remove(&id) {
            self.unindex_document(id, &old);
        }
        self.index_document(id, &document);
        self.records.insert(id, document);
    }

    fn delete(&mut self, id: RecordId) {
        if let Some(old) = self.records.remove(&id) {
            self.unindex_document(id, &old);
        }
    }

    fn clear(&mut self) {
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    fn add_index(&mut self, field: &str) {
        let mut index = FieldIndex::default();
        for (id, document) in &self.records {
            if let Some(key) = document.get(field).and_then(IndexKey::from_value) {
                index.insert(key, *id);
            }
        }
        self.indexes.insert(field.to_string(), index);
    }
}

/// Everything the log describes.
#[derive(Debug, Clone)]
pub(crate) struct StoreState {
    pub(crate) collections: BTreeMap<String, CollectionState>,
    pub(crate) schema_version: SchemaVersion,
    pub(crate) applied: Vec<AppliedMigration>,
    pub(crate) next_id: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            collections: BTreeMap::new(),
            schema_version: 0,
            applied: Vec::new(),
            next_id: 1,
        }
    }
}

impl StoreState {
    pub(crate) fn collection(&self, name: &str) -> CoreResult<&CollectionState> {
        self.collections
            .get(name)
            .ok_or_else(|| CoreError::collection_not_found(name))
    }

    /// Checks a batch against the current image without changing it.
    ///
    /// Ops are checked in order, so a batch may create a collection and
    /// then write to it.
    pub(crate) fn validate(&self, ops: &[LogOp]) -> CoreResult<()> {
        let mut overlay = Overlay::new(self);
        for op in ops {
            overlay.check(op)?;
        }
        Ok(())
    }

    /// Applies one op. Only called with validated or replayed ops, so it
    /// never fails.
    pub(crate) fn apply(&mut self, op: LogOp) {
        match op {
            LogOp::CreateCollection { name, indexes } => {
                self.collections
                    .insert(name, CollectionState::with_indexes(&indexes));
            }
            LogOp::AddIndex { collection, field } => {
                if let Some(state) = self.collections.get_mut(&collection) {
                    state.add_index(&field);
                }
            }
            LogOp::DropCollection { name } => {
                self.collections.remove(&name);
            }
            LogOp::Put {
                collection,
                id,
                document,
            } => {
                self.next_id = self.next_id.max(id.as_u64().saturating_add(1));
                if let Some(state) = self.collections.get_mut(&collection) {
                    state.put(id, document);
                }
            }
            LogOp::Delete { collection, id } => {
                if let Some(state) = self.collections.get_mut(&collection) {
                    state.delete(id);
                }
            }
            LogOp::Clear { collection } => {
                if let Some(state) = self.collections.get_mut(&collection) {
                    state.clear();
                }
            }
            LogOp::SetSchemaVersion {
                version,
                name,
                applied_at,
            } => {
                self.schema_version = version;
                self.applied.push(AppliedMigration {
                    version,
                    name,
                    applied_at,
                });
            }
            LogOp::ReserveIds { next_id } => {
                self.next_id = self.next_id.max(next_id);
            }
        }
    }

    /// Ops that rebuild this image from an empty log.
    pub(crate) fn snapshot(&self) -> Vec<LogOp> {
        let mut ops = Vec::new();
        for applied in &self.applied {
            ops.push(LogOp::SetSchemaVersion {
                version: applied.version,
                name: applied.name.clone(),
                applied_at: applied.applied_at,
            });
        }
        for (name, state) in &self.collections {
            ops.push(LogOp::CreateCollection {
                name: name.clone(),
                indexes: state.indexes.keys().cloned().collect(),
            });
            for (id, document) in &state.records {
                ops.push(LogOp::Put {
                    collection: name.clone(),
                    id: *id,
                    document: document.clone(),
                });
            }
        }
        ops.push(LogOp::ReserveIds {
            next_id: self.next_id,
        });
        ops
    }
}

/// Tracks the effect of earlier ops in a batch during validation.
struct Overlay<'a> {
    base: &'a StoreState,
    /// `Some(indexes)` for created collections, `None` for dropped ones.
    collections: BTreeMap<String, Option<BTreeSet<String>>>,
    /// Collections whose base records no longer apply (cleared or recreated).
    detached: BTreeSet<String>,
    records: BTreeMap<(String, RecordId), bool>,
    schema_version: SchemaVersion,
    next_id: u64,
}

impl<'a> Overlay<'a> {
    fn new(base: &'a StoreState) -> Self {
        Self {
            base,
            collections: BTreeMap::new(),
            detached: BTreeSet::new(),
            records: BTreeMap::new(),
            schema_version: base.schema_version,
            next_id: base.next_id,
        }
    }

    fn indexes(&self, name: &str) -> Option<BTreeSet<String>> {
        match self.collections.get(name) {
            Some(entry) => entry.clone(),
            None => self
                .base
                .collections
                .get(name)
                .map(|c| c.indexes.keys().cloned().collect()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        match self.collections.get(name) {
            Some(entry) => entry.is_some(),
            None => self.base.collections.contains_key(name),
        }
    }

    fn record_exists(&self, collection: &str, id: RecordId) -> bool {
        if let Some(present) = self.records.get(&(collection.to_string(), id)) {
            return *present;
        }
        if self.detached.contains(collection) {
            return false;
        }
        self.base
            .collections
            .get(collection)
            .is_some_and(|c| c.records.contains_key(&id))
    }

    fn require(&self, name: &str) -> CoreResult<()> {
        if self.exists(name) {
            Ok(())
        } else {
            Err(CoreError::collection_not_found(name))
        }
    }

    fn forget_records(&mut self, collection: &str) {
        self.records.retain(|(c, _), _| c != collection);
        self.detached.insert(collection.to_string());
    }

    fn check(&mut self, op: &LogOp) -> CoreResult<()> {
        match op {
            LogOp::CreateCollection { name, indexes } => {
                if self.exists(name) {
                    return Err(CoreError::invalid_operation(format!(
                        "collection {name} already exists"
                    )));
                }
                self.forget_records(name);
                self.collections
                    .insert(name.clone(), Some(indexes.iter().cloned().collect()));
            }
            LogOp::AddIndex { collection, field } => {
                let mut indexes = self
                    .indexes(collection)
                    .ok_or_else(|| CoreError::collection_not_found(collection))?;
                if !indexes.insert(field.clone()) {
                    return Err(CoreError::invalid_operation(format!(
                        "index {collection}.{field} already exists"
                    )));
                }
                self.collections.insert(collection.clone(), Some(indexes));
            }
            LogOp::DropCollection { name } => {
                self.require(name)?;
                self.forget_records(name);
                self.collections.insert(name.clone(), None);
            }
            LogOp::Put { collection, id, .. } => {
                self.require(collection)?;
                if id.is_unassigned() {
                    return Err(CoreError::invalid_operation("record id 0 is reserved"));
                }
                self.next_id = self.next_id.max(id.as_u64().saturating_add(1));
                self.records.insert((collection.clone(), *id), true);
            }
            LogOp::Delete { collection, id } => {
                self.require(collection)?;
                if !self.record_exists(collection, *id) {
                    return Err(CoreError::not_found(collection.clone(), *id));
                }
                self.records.insert((collection.clone(), *id), false);
            }
            LogOp::Clear { collection } => {
                self.require(collection)?;
                self.forget_records(collection);
            }
            LogOp::SetSchemaVersion { version, .. } => {
                if *version <= self.schema_version {
                    return Err(CoreError::invalid_operation(format!(
                        "schema version {version} does not advance {}",
                        self.schema_version
                    )));
                }
                self.schema_version = *version;
            }
            LogOp::ReserveIds { next_id } => {
                if *next_id < self.next_id {
                    return Err(CoreError::invalid_operation(format!(
                        "id reservation {next_id} would reuse ids below {}",
                        self.next_id
                    )));
                }
                self.next_id = *next_id;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn create(name: &str, indexes: &[&str]) -> LogOp {
        LogOp::CreateCollection {
            name: name.into(),
            indexes: indexes.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn put(collection: &str, id: u64, value: serde_json::Value) -> LogOp {
        LogOp::Put {
            collection: collection.into(),
            id: RecordId::new(id),
            document: doc(value),
        }
    }

    fn apply_all(state: &mut StoreState, ops: Vec<LogOp>) {
        state.validate(&ops).unwrap();
        for op in ops {
            state.apply(op);
        }
    }

    #[test]
    fn puts_maintain_indexes() {
        let mut state = StoreState::default();
        apply_all(
            &mut state,
            vec![
                create("exercises", &["muscle_group"]),
                put("exercises", 1, json!({"muscle_group": 3})),
                put("exercises", 2, json!({"muscle_group": 3})),
            ],
        );
        let index = &state.collection("exercises").unwrap().indexes["muscle_group"];
        assert_eq!(index.lookup(&IndexKey::Int(3)).len(), 2);

        apply_all(&mut state, vec![put("exercises", 2, json!({"muscle_group": 4}))]);
        let index = &state.collection("exercises").unwrap().indexes["muscle_group"];
        assert_eq!(index.lookup(&IndexKey::Int(3)), vec![RecordId::new(1)]);
        assert_eq!(index.lookup(&IndexKey::Int(4)), vec![RecordId::new(2)]);
        assert_eq!(state.next_id, 3);
    }

    #[test]
    fn batch_may_create_then_write() {
        let state = StoreState::default();
        let ops = vec![create("settings", &[]), put("settings", 1, json!({}))];
        assert!(state.validate(&ops).is_ok());
    }

    #[test]
    fn writes_to_dropped_collection_are_rejected() {
        let mut state = StoreState::default();
        apply_all(&mut state, vec![create("sets", &[])]);
        let ops = vec![
            LogOp::DropCollection { name: "sets".into() },
            put("sets", 1, json!({})),
        ];
        assert!(matches!(
            state.validate(&ops),
            Err(CoreError::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn delete_after_clear_is_not_found() {
        let mut state = StoreState::default();
        apply_all(&mut state, vec![create("c", &[]), put("c", 1, json!({}))]);
        let ops = vec![
            LogOp::Clear {
                collection: "c".into(),
            },
            LogOp::Delete {
                collection: "c".into(),
                id: RecordId::new(1),
            },
        ];
        assert!(matches!(state.validate(&ops), Err(CoreError::NotFound { .. })));
    }

    #[test]
    fn add_index_backfills() {
        let mut state = StoreState::default();
        apply_all(
            &mut state,
            vec![
                create("muscle_groups", &[]),
                put("muscle_groups", 1, json!({"sort_order": 2})),
                put("muscle_groups", 2, json!({"sort_order": 1})),
                LogOp::AddIndex {
                    collection: "muscle_groups".into(),
                    field: "sort_order".into(),
                },
            ],
        );
        let index = &state.collection("muscle_groups").unwrap().indexes["sort_order"];
        assert_eq!(index.range(..), vec![RecordId::new(2), RecordId::new(1)]);
    }

    #[test]
    fn schema_version_must_advance() {
        let mut state = StoreState::default();
        apply_all(
            &mut state,
            vec![LogOp::SetSchemaVersion {
                version: 1,
                name: "initial".into(),
                applied_at: 0,
            }],
        );
        let again = vec![LogOp::SetSchemaVersion {
            version: 1,
            name: "initial".into(),
            applied_at: 1,
        }];
        assert!(state.validate(&again).is_err());
    }

    #[test]
    fn snapshot_rebuilds_equal_state() {
        let mut state = StoreState::default();
        apply_all(
            &mut state,
            vec![
                create("c", &["k"]),
                put("c", 4, json!({"k": "a"})),
                put("c", 9, json!({"k": "b"})),
                LogOp::Delete {
                    collection: "c".into(),
                    id: RecordId::new(9),
                },
            ],
        );

        let mut rebuilt = StoreState::default();
        for op in state.snapshot() {
            rebuilt.apply(op);
        }
        assert_eq!(rebuilt.next_id, 10);
        assert_eq!(
            rebuilt.collection("c").unwrap().records,
            state.collection("c").unwrap().records
        );
    }
}
