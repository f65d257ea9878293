//! Backup export, import and clear commands.
//!
//! Import and clear are full replaces of everything in the database, so
//! both refuse to run without `--force`.

use super::CmdResult;
use liftlog_core::{Clock, Database};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Writes a backup document to `output`, or stdout.
pub fn export(db: &Database, output: Option<&Path>) -> CmdResult {
    let text = db.export_backup()?;

    match output {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            println!("✓ Backup written to {}", path.display());
            println!("  Size: {} bytes", text.len());
        }
        None => println!("{text}"),
    }

    let now = db.store().clock().now_millis();
    db.settings()?.mark_backed_up(now)?;
    Ok(())
}

/// Replaces all data with a backup document.
pub fn import(db: &Database, input: &Path, force: bool) -> CmdResult {
    if !force {
        return Err("Import replaces ALL current data. Re-run with --force to continue.".into());
    }
    info!("Importing backup from {:?}", input);

    let text = fs::read_to_string(input)?;
    let stats = db.import_backup(&text)?;

    println!("✓ Backup imported");
    println!("  Schema version: {}", stats.schema_version);
    for (collection, count) in &stats.collections {
        println!("  {collection:<22} {count}");
    }
    println!("  Total records: {}", stats.total);
    Ok(())
}

/// Deletes every record.
pub fn clear(db: &Database, force: bool) -> CmdResult {
    if !force {
        return Err("Clear deletes ALL data. Re-run with --force to continue.".into());
    }
    db.clear_all_data()?;
    println!("✓ All data cleared");
    Ok(())
}
