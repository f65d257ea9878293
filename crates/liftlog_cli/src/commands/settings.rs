//! Settings commands.

use super::{format_millis, print_json, CmdResult};
use liftlog_core::{Database, SettingsPatch, Theme, WeightUnit};

/// Prints current settings.
pub fn show(db: &Database, json: bool) -> CmdResult {
    let store = db.settings()?;
    let settings = store.get()?;
    if json {
        return print_json(&settings);
    }

    println!("Settings");
    println!("========");
    println!("  Unit:             {}", settings.unit);
    println!("  Theme:            {}", settings.theme);
    println!(
        "  Backup reminder:  {} (every {} day(s))",
        if settings.backup_reminder { "on" } else { "off" },
        settings.backup_frequency_days
    );
    println!(
        "  Last backup:      {}",
        settings
            .last_backup_at
            .map_or_else(|| "never".to_string(), format_millis)
    );
    if store.backup_due()? {
        println!("\n  A backup is due: run `liftlog export -o <file>`.");
    }
    Ok(())
}

/// Applies the given changes.
pub fn set(
    db: &Database,
    unit: Option<&str>,
    theme: Option<&str>,
    backup_reminder: Option<bool>,
    backup_frequency_days: Option<u32>,
) -> CmdResult {
    let patch = SettingsPatch {
        unit: unit.map(str::parse::<WeightUnit>).transpose()?,
        theme: theme.map(str::parse::<Theme>).transpose()?,
        backup_reminder,
        backup_frequency_days,
    };
    if patch.is_empty() {
        return Err("Nothing to change; pass at least one setting".into());
    }
    db.settings()?.update(&patch)?;
    println!("✓ Settings updated");
    Ok(())
}
