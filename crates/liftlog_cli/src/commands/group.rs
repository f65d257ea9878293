//! Muscle group commands.

use super::{print_json, CmdResult};
use liftlog_core::{Database, MuscleGroup, MuscleGroupPatch};

/// Adds a muscle group.
pub fn add(
    db: &Database,
    identifier: String,
    name: Option<String>,
    color: Option<String>,
    icon: Option<String>,
    sort_order: i64,
) -> CmdResult {
    let mut group = MuscleGroup::new(identifier).with_sort_order(sort_order);
    if let Some(name) = name {
        group = group.with_name(name);
    }
    if let Some(color) = color {
        group = group.with_color(color);
    }
    if let Some(icon) = icon {
        group = group.with_icon(icon);
    }

    let group = db.catalog()?.create_muscle_group(group)?;
    println!("✓ Added muscle group {} ({})", group.identifier, group.id);
    Ok(())
}

/// Lists muscle groups by sort order.
pub fn list(db: &Database, all: bool, json: bool) -> CmdResult {
    let catalog = db.catalog()?;
    let groups = if all {
        catalog.muscle_groups()?
    } else {
        catalog.active_muscle_groups()?
    };

    if json {
        return print_json(&groups);
    }
    if groups.is_empty() {
        println!("No muscle groups. Add one with `liftlog group add <identifier>`.");
        return Ok(());
    }
    for group in &groups {
        let exercises = catalog.exercises_by_muscle_group(&group.identifier)?.len();
        println!(
            "  {:<16} {:<20} {:>3} exercise(s){}",
            group.identifier,
            group.name,
            exercises,
            if group.is_active { "" } else { "  [inactive]" }
        );
    }
    Ok(())
}

/// Hides or shows a muscle group.
pub fn set_active(db: &Database, identifier: &str, active: bool) -> CmdResult {
    let catalog = db.catalog()?;
    let group = catalog
        .muscle_group_by_identifier(identifier)?
        .ok_or_else(|| format!("No muscle group {identifier:?}"))?;
    let patch = MuscleGroupPatch {
        is_active: Some(active),
        ..MuscleGroupPatch::default()
    };
    catalog.update_muscle_group(group.id, &patch)?;
    println!(
        "✓ {} is now {}",
        identifier,
        if active { "active" } else { "inactive" }
    );
    Ok(())
}

/// Removes a muscle group nothing references.
pub fn remove(db: &Database, identifier: &str) -> CmdResult {
    let catalog = db.catalog()?;
    let group = catalog
        .muscle_group_by_identifier(identifier)?
        .ok_or_else(|| format!("No muscle group {identifier:?}"))?;
    catalog.delete_muscle_group(group.id)?;
    println!("✓ Removed muscle group {identifier}");
    Ok(())
}
