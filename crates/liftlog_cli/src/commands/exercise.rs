//! Exercise commands.

use super::{print_json, resolve_exercise, CmdResult};
use liftlog_core::{Database, Exercise, ExercisePatch, WeightUnit};

/// Adds an exercise to a muscle group.
pub fn add(
    db: &Database,
    name: String,
    group: String,
    aliases: Vec<String>,
    unit: Option<String>,
    demo_url: Option<String>,
) -> CmdResult {
    let mut exercise = Exercise::new(name, group);
    for alias in aliases {
        exercise = exercise.with_alias(alias);
    }
    if let Some(unit) = unit {
        exercise = exercise.with_unit(unit.parse::<WeightUnit>()?);
    }
    if let Some(url) = demo_url {
        exercise = exercise.with_demo_url(url);
    }

    let exercise = db.catalog()?.create_exercise(exercise)?;
    println!("✓ Added exercise {} ({})", exercise.name, exercise.id);
    Ok(())
}

/// Lists exercises, optionally for one muscle group.
pub fn list(db: &Database, group: Option<&str>, json: bool) -> CmdResult {
    let catalog = db.catalog()?;
    let exercises = match group {
        Some(group) => catalog.exercises_by_muscle_group(group)?,
        None => catalog.all_exercises()?,
    };

    if json {
        return print_json(&exercises);
    }
    if exercises.is_empty() {
        println!("No exercises.");
        return Ok(());
    }
    for exercise in &exercises {
        let aliases = if exercise.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aka {})", exercise.aliases.join(", "))
        };
        println!(
            "  {:>5}  {:<24} {}{}",
            exercise.id.as_u64(),
            exercise.name,
            exercise.muscle_group,
            aliases
        );
    }
    Ok(())
}

/// Renames an exercise.
pub fn rename(db: &Database, reference: &str, name: String) -> CmdResult {
    let catalog = db.catalog()?;
    let exercise = resolve_exercise(&catalog, reference)?;
    let patch = ExercisePatch {
        name: Some(name),
        ..ExercisePatch::default()
    };
    let updated = catalog.update_exercise(exercise.id, &patch)?;
    println!("✓ Renamed {} to {}", exercise.name, updated.name);
    Ok(())
}

/// Removes an exercise. Logged history is kept.
pub fn remove(db: &Database, reference: &str) -> CmdResult {
    let catalog = db.catalog()?;
    let exercise = resolve_exercise(&catalog, reference)?;
    catalog.delete_exercise(exercise.id)?;
    println!("✓ Removed exercise {}", exercise.name);
    Ok(())
}
