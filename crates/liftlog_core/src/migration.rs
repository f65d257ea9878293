//! Migration engine.
//!
//! Interprets the [`SchemaRegistry`] against a live store. Migrations are:
//! - **Forward-only**: a store is never taken back to an older version
//! - **Per-version atomic**: the deltas of one version and the version bump
//!   are written as a single log frame
//! - **Idempotent**: running against a current store does nothing
//!
//! If version `k` fails, versions before it stay applied and the store
//! reports `k - 1`.

use crate::error::{CoreError, CoreResult};
use crate::log::LogOp;
use crate::schema::{SchemaDelta, SchemaRegistry};
use crate::store::EntityStore;
use crate::types::SchemaVersion;
use serde::Serialize;

/// A version recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// Version reached.
    pub version: SchemaVersion,
    /// Migration name.
    pub name: String,
    /// When it was applied (Unix millis).
    pub applied_at: i64,
}

/// Where a store stands relative to the registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationState {
    /// Version recorded in the store.
    pub current_version: SchemaVersion,
    /// Newest version the registry knows.
    pub latest_version: SchemaVersion,
    /// Applied migrations, oldest first.
    pub applied: Vec<AppliedMigration>,
}

impl MigrationState {
    /// Checks if a version has been applied.
    #[must_use]
    pub fn is_applied(&self, version: SchemaVersion) -> bool {
        self.applied.iter().any(|m| m.version == version)
    }

    /// True when no migration is pending.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current_version == self.latest_version
    }

    /// Versions still to apply, ascending.
    #[must_use]
    pub fn pending(&self) -> Vec<SchemaVersion> {
        (self.current_version + 1..=self.latest_version).collect()
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Version before the run.
    pub from_version: SchemaVersion,
    /// Version after the run.
    pub to_version: SchemaVersion,
    /// Versions applied by this run.
    pub applied: Vec<AppliedMigration>,
}

impl MigrationReport {
    /// True when the store was already at the target.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies registry versions to a store.
pub struct MigrationEngine<'a> {
    store: &'a EntityStore,
    registry: &'a SchemaRegistry,
}

impl<'a> MigrationEngine<'a> {
    /// Creates an engine over `store`.
    pub fn new(store: &'a EntityStore, registry: &'a SchemaRegistry) -> Self {
        Self { store, registry }
    }

    /// Current migration state.
    pub fn state(&self) -> MigrationState {
        MigrationState {
            current_version: self.store.schema_version(),
            latest_version: self.registry.current_version(),
            applied: self.store.applied_migrations(),
        }
    }

    /// Brings the store to the registry's current version.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] if the store is newer than the
    /// registry or a version fails to apply.
    pub fn ensure_current(&self) -> CoreResult<MigrationReport> {
        self.migrate_to(self.registry.current_version())
    }

    /// Applies every version after the stored one up to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] if `target` is unknown or older
    /// than the stored version, or if a version fails to apply.
    pub fn migrate_to(&self, target: SchemaVersion) -> CoreResult<MigrationReport> {
        let from = self.store.schema_version();
        let latest = self.registry.current_version();

        if from > latest {
            return Err(CoreError::migration(
                from,
                format!("store is at schema version {from} but this build only knows up to {latest}"),
            ));
        }
        if target > latest {
            return Err(CoreError::migration(
                target,
                format!("unknown schema version {target}, newest known is {latest}"),
            ));
        }
        if target < from {
            return Err(CoreError::migration(
                target,
                format!("cannot migrate backwards from {from}"),
            ));
        }

        let mut applied = Vec::new();
        for version in from + 1..=target {
            applied.push(self.apply_version(version)?);
        }

        if !applied.is_empty() {
            tracing::info!(from, to = target, "schema migrated");
        }
        Ok(MigrationReport {
            from_version: from,
            to_version: self.store.schema_version(),
            applied,
        })
    }

    fn apply_version(&self, version: SchemaVersion) -> CoreResult<AppliedMigration> {
        let spec = self.registry.version(version).ok_or_else(|| {
            CoreError::migration(version, "version missing from registry")
        })?;

        let mut ops = Vec::with_capacity(spec.deltas.len() + 1);
        for delta in &spec.deltas {
            match delta {
                SchemaDelta::CreateCollection { name, indexes } => {
                    ops.push(LogOp::CreateCollection {
                        name: (*name).to_string(),
                        indexes: indexes.iter().map(|f| (*f).to_string()).collect(),
                    });
                }
                SchemaDelta::AddIndex { collection, field } => {
                    ops.push(LogOp::AddIndex {
                        collection: (*collection).to_string(),
                        field: (*field).to_string(),
                    });
                }
                SchemaDelta::DropCollection { name, data_loss } => {
                    let records = self.store.count(name).unwrap_or(0);
                    tracing::warn!(
                        version,
                        collection = *name,
                        records,
                        data_loss = *data_loss,
                        "dropping collection, its records are discarded"
                    );
                    ops.push(LogOp::DropCollection {
                        name: (*name).to_string(),
                    });
                }
            }
        }

        let applied = AppliedMigration {
            version,
            name: spec.name.to_string(),
            applied_at: self.store.clock().now_millis(),
        };
        ops.push(LogOp::SetSchemaVersion {
            version,
            name: applied.name.clone(),
            applied_at: applied.applied_at,
        });

        self.store.commit_ops(ops).map_err(|err| match err {
            CoreError::Migration { .. } => err,
            other => CoreError::migration(version, other.to_string()),
        })?;

        tracing::info!(version, name = spec.name, "applied schema version");
        Ok(applied)
    }

    /// Checks that the store's collections and indexes are exactly what
    /// the registry says its version should have.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Migration`] describing the first difference.
    pub fn verify(&self) -> CoreResult<()> {
        let version = self.store.schema_version();
        let expected = self.registry.definition_at(version)?;

        let actual: Vec<String> = self.store.collections();
        let wanted: Vec<String> = expected.names().map(str::to_string).collect();
        if actual != wanted {
            return Err(CoreError::migration(
                version,
                format!("collections {actual:?} do not match schema {wanted:?}"),
            ));
        }

        for spec in expected.collections() {
            let indexes = self.store.indexes(&spec.name)?;
            let wanted: Vec<String> = spec.indexes.iter().cloned().collect();
            if indexes != wanted {
                return Err(CoreError::migration(
                    version,
                    format!(
                        "indexes of {} are {indexes:?}, schema declares {wanted:?}",
                        spec.name
                    ),
                ));
            }
        }
        Ok(())
    }
}
