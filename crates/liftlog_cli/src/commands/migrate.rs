//! Migration commands.

use super::{format_millis, print_json, CmdResult};
use liftlog_core::Database;
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport<'a> {
    current_version: u32,
    latest_version: u32,
    applied: &'a [liftlog_core::AppliedMigration],
    pending: Vec<u32>,
}

/// Shows applied and pending schema versions.
///
/// Opening the database already migrated it, so nothing is normally
/// pending.
pub fn status(db: &Database, json: bool) -> CmdResult {
    let state = db.migration_state();

    if json {
        return print_json(&StatusReport {
            current_version: state.current_version,
            latest_version: state.latest_version,
            applied: &state.applied,
            pending: state.pending(),
        });
    }

    println!("Migration Status");
    println!("================");
    println!("  Current version: {}", state.current_version);
    println!("  Latest version:  {}", state.latest_version);
    println!("  Applied migrations: {}", state.applied.len());

    if !state.applied.is_empty() {
        println!("\nApplied Migrations:");
        for migration in &state.applied {
            println!(
                "  v{}: {} (applied at {})",
                migration.version,
                migration.name,
                format_millis(migration.applied_at)
            );
        }
    }

    let registry = db.registry();
    for version in state.pending() {
        let name = registry.version(version).map_or("?", |v| v.name);
        println!("  v{version}: {name} [pending]");
    }
    Ok(())
}
