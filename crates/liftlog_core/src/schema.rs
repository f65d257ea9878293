//! Schema registry.
//!
//! The registry is pure data: an ordered list of versions, each a list of
//! [`SchemaDelta`]s. The layout of the store at version `N` is whatever
//! folding deltas `1..=N` produces; [`SchemaRegistry::definition_at`]
//! performs that fold. Nothing here touches storage, see
//! [`crate::migration`] for the interpreter.

use crate::error::{CoreError, CoreResult};
use crate::types::SchemaVersion;
use std::collections::{BTreeMap, BTreeSet};

/// Collection names used by the built-in schema.
pub mod names {
    /// Exercise catalog.
    pub const EXERCISES: &str = "exercises";
    /// Muscle groups.
    pub const MUSCLE_GROUPS: &str = "muscle_groups";
    /// One session per calendar day.
    pub const WORKOUT_SESSIONS: &str = "workout_sessions";
    /// Per-session exercise completions.
    pub const EXERCISE_COMPLETIONS: &str = "exercise_completions";
    /// Flat per-exercise set ledger.
    pub const SET_ENTRIES: &str = "set_entries";
    /// Settings singleton.
    pub const SETTINGS: &str = "settings";
    /// Identifiers of deleted muscle groups.
    pub const RETIRED_IDENTIFIERS: &str = "retired_identifiers";
    /// Retired in version 2.
    pub const LEGACY_WORKOUTS: &str = "workouts";
    /// Retired in version 3.
    pub const LEGACY_SETS: &str = "sets";
}

/// One atomic schema change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDelta {
    /// Create an empty collection with the given indexed fields.
    CreateCollection {
        /// Collection name.
        name: &'static str,
        /// Indexed fields.
        indexes: &'static [&'static str],
    },
    /// Index a field of an existing collection, backfilling current records.
    AddIndex {
        /// Collection name.
        collection: &'static str,
        /// Field to index.
        field: &'static str,
    },
    /// Remove a collection and **permanently discard its records**.
    DropCollection {
        /// Collection name.
        name: &'static str,
        /// What is lost; dropped data cannot be recovered by any later version.
        data_loss: &'static str,
    },
}

/// The deltas that take the store from `version - 1` to `version`.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    /// Target version.
    pub version: SchemaVersion,
    /// Short name, recorded with the applied migration.
    pub name: &'static str,
    /// Deltas in application order.
    pub deltas: Vec<SchemaDelta>,
}

/// A collection and its indexed fields at some version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Indexed fields.
    pub indexes: BTreeSet<String>,
}

/// Full layout of the store at one version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    collections: BTreeMap<String, CollectionSpec>,
}

impl SchemaDefinition {
    /// Looks up a collection.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.get(name)
    }

    /// Collection names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// All collection specs in name order.
    pub fn collections(&self) -> impl Iterator<Item = &CollectionSpec> {
        self.collections.values()
    }

    /// Number of collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// True when no collection exists (version 0).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Folds one delta into the layout.
    pub(crate) fn apply(&mut self, delta: &SchemaDelta) -> Result<(), String> {
        match delta {
            SchemaDelta::CreateCollection { name, indexes } => {
                if self.collections.contains_key(*name) {
                    return Err(format!("collection {name} already exists"));
                }
                self.collections.insert(
                    (*name).to_string(),
                    CollectionSpec {
                        name: (*name).to_string(),
                        indexes: indexes.iter().map(|f| (*f).to_string()).collect(),
                    },
                );
            }
            SchemaDelta::AddIndex { collection, field } => {
                let spec = self
                    .collections
                    .get_mut(*collection)
                    .ok_or_else(|| format!("cannot index missing collection {collection}"))?;
                if !spec.indexes.insert((*field).to_string()) {
                    return Err(format!("index {collection}.{field} already exists"));
                }
            }
            SchemaDelta::DropCollection { name, .. } => {
                if self.collections.remove(*name).is_none() {
                    return Err(format!("cannot drop missing collection {name}"));
                }
            }
        }
        Ok(())
    }
}

/// Ordered, validated schema history.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    versions: Vec<VersionSpec>,
}

impl SchemaRegistry {
    /// Builds a registry from a custom history.
    ///
    /// # Errors
    ///
    /// Returns a migration error if versions are not `1, 2, 3, ...` or if
    /// the deltas don't fold cleanly (dropping a missing collection, ...).
    pub fn new(versions: Vec<VersionSpec>) -> CoreResult<Self> {
        let mut layout = SchemaDefinition::default();
        for (i, spec) in versions.iter().enumerate() {
            let expected = SchemaVersion::try_from(i + 1).unwrap_or(SchemaVersion::MAX);
            if spec.version != expected {
                return Err(CoreError::migration(
                    spec.version,
                    format!("schema version gap: expected {expected}, got {}", spec.version),
                ));
            }
            for delta in &spec.deltas {
                layout
                    .apply(delta)
                    .map_err(|message| CoreError::migration(spec.version, message))?;
            }
        }
        Ok(Self { versions })
    }

    /// The schema history shipped with this release.
    #[must_use]
    pub fn builtin() -> Self {
        use names::*;

        Self {
            versions: vec![
                VersionSpec {
                    version: 1,
                    name: "initial",
                    deltas: vec![
                        SchemaDelta::CreateCollection {
                            name: EXERCISES,
                            indexes: &["muscle_group"],
                        },
                        SchemaDelta::CreateCollection {
                            name: MUSCLE_GROUPS,
                            indexes: &["identifier"],
                        },
                        SchemaDelta::CreateCollection {
                            name: LEGACY_WORKOUTS,
                            indexes: &["date"],
                        },
                        SchemaDelta::CreateCollection {
                            name: LEGACY_SETS,
                            indexes: &["exercise_id", "timestamp"],
                        },
                        SchemaDelta::CreateCollection {
                            name: SETTINGS,
                            indexes: &[],
                        },
                    ],
                },
                VersionSpec {
                    version: 2,
                    name: "daily_sessions",
                    deltas: vec![
                        SchemaDelta::CreateCollection {
                            name: WORKOUT_SESSIONS,
                            indexes: &["date"],
                        },
                        SchemaDelta::CreateCollection {
                            name: EXERCISE_COMPLETIONS,
                            indexes: &["session_id", "exercise_id"],
                        },
                        SchemaDelta::DropCollection {
                            name: LEGACY_WORKOUTS,
                            data_loss: "pre-session workout records",
                        },
                    ],
                },
                VersionSpec {
                    version: 3,
                    name: "set_ledger",
                    deltas: vec![
                        SchemaDelta::DropCollection {
                            name: LEGACY_SETS,
                            data_loss: "legacy set history and its timestamp index",
                        },
                        SchemaDelta::CreateCollection {
                            name: SET_ENTRIES,
                            indexes: &["exercise_id", "recorded_at"],
                        },
                    ],
                },
                VersionSpec {
                    version: 4,
                    name: "ordering_indexes",
                    deltas: vec![
                        SchemaDelta::AddIndex {
                            collection: MUSCLE_GROUPS,
                            field: "sort_order",
                        },
                        SchemaDelta::AddIndex {
                            collection: WORKOUT_SESSIONS,
                            field: "status",
                        },
                        SchemaDelta::AddIndex {
                            collection: EXERCISES,
                            field: "name",
                        },
                    ],
                },
                VersionSpec {
                    version: 5,
                    name: "retired_identifiers",
                    deltas: vec![SchemaDelta::CreateCollection {
                        name: RETIRED_IDENTIFIERS,
                        indexes: &["identifier"],
                    }],
                },
            ],
        }
    }

    /// Latest version in the history.
    #[must_use]
    pub fn current_version(&self) -> SchemaVersion {
        self.versions.last().map_or(0, |v| v.version)
    }

    /// The version entry for `version`, if any.
    #[must_use]
    pub fn version(&self, version: SchemaVersion) -> Option<&VersionSpec> {
        let index = usize::try_from(version).ok()?.checked_sub(1)?;
        self.versions.get(index)
    }

    /// All versions in ascending order.
    #[must_use]
    pub fn versions(&self) -> &[VersionSpec] {
        &self.versions
    }

    /// Layout of the store at `version`.
    ///
    /// # Errors
    ///
    /// Returns a migration error if `version` is newer than the registry.
    pub fn definition_at(&self, version: SchemaVersion) -> CoreResult<SchemaDefinition> {
        if version > self.current_version() {
            return Err(CoreError::migration(
                version,
                format!(
                    "unknown schema version {version}, newest known is {}",
                    self.current_version()
                ),
            ));
        }

        let mut layout = SchemaDefinition::default();
        for spec in self.versions.iter().take_while(|v| v.version <= version) {
            for delta in &spec.deltas {
                layout
                    .apply(delta)
                    .map_err(|message| CoreError::migration(spec.version, message))?;
            }
        }
        Ok(layout)
    }

    /// Layout at the current version.
    ///
    /// # Errors
    ///
    /// Only fails for a registry that was not built through [`Self::new`]
    /// or [`Self::builtin`].
    pub fn current_definition(&self) -> CoreResult<SchemaDefinition> {
        self.definition_at(self.current_version())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
