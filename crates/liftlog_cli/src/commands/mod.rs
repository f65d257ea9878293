//! CLI command implementations.

pub mod backup;
pub mod compact;
pub mod exercise;
pub mod group;
pub mod history;
pub mod migrate;
pub mod settings;
pub mod today;

use chrono::{DateTime, Local, NaiveDate};
use liftlog_core::{Catalog, Clock, Config, Database, Exercise, FixedClock, RecordId, SystemClock};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Result type shared by every command.
pub type CmdResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Opens the database, pinning "today" to `date` when given.
pub fn open(path: &Path, date: Option<NaiveDate>) -> CmdResult<Database> {
    let clock: Arc<dyn Clock> = match date {
        Some(day) => Arc::new(FixedClock::new(day)),
        None => Arc::new(SystemClock),
    };
    Ok(Database::open_with_clock(path, Config::default(), clock)?)
}

/// Whether `format` asks for JSON output.
pub fn wants_json(format: &str) -> CmdResult<bool> {
    match format {
        "text" => Ok(false),
        "json" => Ok(true),
        other => Err(format!("Unknown output format: {other} (expected text or json)").into()),
    }
}

/// Pretty-prints `value` as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Looks an exercise up by numeric id, then by name or alias.
pub fn resolve_exercise(catalog: &Catalog<'_>, reference: &str) -> CmdResult<Exercise> {
    if let Ok(raw) = reference.parse::<u64>() {
        if let Some(exercise) = catalog.exercise(RecordId::new(raw))? {
            return Ok(exercise);
        }
    }
    catalog
        .find_exercise_by_name(reference)?
        .ok_or_else(|| format!("No exercise matches {reference:?}").into())
}

/// Formats Unix millis in local time.
pub fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Formats a weight without a trailing `.0`.
pub fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{weight:.0}")
    } else {
        format!("{weight}")
    }
}
