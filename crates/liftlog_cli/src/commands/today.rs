//! Today's session commands.

use super::{format_weight, print_json, resolve_exercise, CmdResult};
use liftlog_core::{Database, SetEntry};

/// Starts today's session or switches its muscle group.
pub fn select(db: &Database, group: &str) -> CmdResult {
    let session = db.sessions()?.get_or_create_today(group)?;
    println!(
        "✓ {} session {} is {} ({})",
        session.date, session.id, session.muscle_group, session.status
    );
    Ok(())
}

/// Shows today's session with its completions.
pub fn show(db: &Database, json: bool) -> CmdResult {
    let sessions = db.sessions()?;
    let Some(session) = sessions.today_session()? else {
        if json {
            return print_json(&serde_json::Value::Null);
        }
        println!("No session today. Start one with `liftlog today select <group>`.");
        return Ok(());
    };
    let detail = sessions.session_with_completions(session.id)?;
    if json {
        return print_json(&detail);
    }

    let catalog = db.catalog()?;
    println!(
        "{}  {}  [{}]",
        detail.session.date, detail.session.muscle_group, detail.session.status
    );
    if detail.completions.is_empty() {
        println!("  nothing logged yet");
    }
    for completion in &detail.completions {
        let name = catalog
            .exercise(completion.exercise_id)?
            .map_or_else(|| completion.exercise_id.to_string(), |e| e.name);
        let sets: Vec<String> = completion.sets.iter().map(format_set).collect();
        println!("  {:<24} {}", name, sets.join("  "));
    }
    println!("  volume: {}", format_weight(detail.volume()));
    Ok(())
}

/// Logs the sets of an exercise in today's session.
pub fn complete(db: &Database, reference: &str, raw_sets: &[String]) -> CmdResult {
    let sets = raw_sets
        .iter()
        .map(|s| parse_set(s))
        .collect::<Result<Vec<_>, _>>()?;
    let exercise = resolve_exercise(&db.catalog()?, reference)?;
    let completion = db.sessions()?.complete_exercise(exercise.id, sets)?;
    println!(
        "✓ Logged {} set(s) of {} (volume {})",
        completion.sets.len(),
        exercise.name,
        format_weight(completion.volume())
    );
    Ok(())
}

/// Marks today's session completed.
pub fn finish(db: &Database) -> CmdResult {
    let sessions = db.sessions()?;
    let session = sessions
        .today_session()?
        .ok_or("No session today to finish")?;
    let session = sessions.complete_session(session.id)?;
    println!("✓ Finished {} session ({})", session.date, session.muscle_group);
    Ok(())
}

/// Parses `WEIGHTxREPS` or `WEIGHTxREPS@RPE`.
pub fn parse_set(text: &str) -> Result<SetEntry, String> {
    let (load, rpe) = match text.split_once('@') {
        Some((load, rpe)) => (load, Some(rpe)),
        None => (text, None),
    };
    let (weight, reps) = load
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("set {text:?} is not WEIGHTxREPS"))?;
    let weight: f64 = weight
        .trim()
        .parse()
        .map_err(|_| format!("bad weight in set {text:?}"))?;
    let reps: u32 = reps
        .trim()
        .parse()
        .map_err(|_| format!("bad reps in set {text:?}"))?;

    let mut set = SetEntry::new(weight, reps);
    if let Some(rpe) = rpe {
        let rpe: u8 = rpe
            .trim()
            .parse()
            .map_err(|_| format!("bad RPE in set {text:?}"))?;
        set = set.with_rpe(rpe);
    }
    Ok(set)
}

fn format_set(set: &SetEntry) -> String {
    match set.rpe {
        Some(rpe) => format!("{}x{}@{}", format_weight(set.weight), set.reps, rpe),
        None => format!("{}x{}", format_weight(set.weight), set.reps),
    }
}
