//! History, personal-record and trend commands.

use super::{format_millis, format_weight, print_json, resolve_exercise, CmdResult};
use chrono::{Days, NaiveDate};
use liftlog_core::{Clock, Database, Estimator, History};

const DEFAULT_RANGE_DAYS: u64 = 30;

fn history_with<'a>(db: &'a Database, estimator: Option<&str>) -> CmdResult<History<'a>> {
    let history = db.history()?;
    Ok(match estimator {
        Some(name) => history.with_estimator(name.parse::<Estimator>()?),
        None => history,
    })
}

/// Lists sessions in a date range.
pub fn sessions(
    db: &Database,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    all: bool,
    json: bool,
) -> CmdResult {
    let today = db.store().clock().today();
    let end = to.unwrap_or(today);
    let start = from.unwrap_or_else(|| {
        end.checked_sub_days(Days::new(DEFAULT_RANGE_DAYS))
            .unwrap_or(NaiveDate::MIN)
    });

    let history = db.history()?;
    let sessions = if all {
        history.sessions_between(start, end)?
    } else {
        history.history_sessions(start, end)?
    };

    if json {
        return print_json(&sessions);
    }
    if sessions.is_empty() {
        println!("No sessions between {start} and {end}.");
        return Ok(());
    }
    let lifecycle = db.sessions()?;
    for session in &sessions {
        let detail = lifecycle.session_with_completions(session.id)?;
        println!(
            "  {}  {:<16} {:<12} {:>2} exercise(s)  volume {}",
            session.date,
            session.muscle_group,
            session.status,
            detail.completions.len(),
            format_weight(detail.volume())
        );
    }
    Ok(())
}

/// Shows the recent sets of an exercise.
pub fn exercise(db: &Database, reference: &str, limit: Option<usize>, json: bool) -> CmdResult {
    let exercise = resolve_exercise(&db.catalog()?, reference)?;
    let history = db.history()?;
    let entries = history.exercise_history(exercise.id, limit)?;

    if json {
        return print_json(&entries);
    }
    println!("{}", exercise.name);
    if entries.is_empty() {
        println!("  no sets logged");
        return Ok(());
    }
    for entry in &entries {
        let rpe = entry.rpe.map(|r| format!(" @{r}")).unwrap_or_default();
        println!(
            "  {}  {} x {}{}",
            format_millis(entry.recorded_at),
            format_weight(entry.weight),
            entry.reps,
            rpe
        );
    }
    if let Some(next) = history.last_used_defaults(exercise.id)? {
        println!("  next time: {} x {}", format_weight(next.weight), next.reps);
    }
    Ok(())
}

/// Shows personal records for one or every exercise.
pub fn prs(
    db: &Database,
    reference: Option<&str>,
    estimator: Option<&str>,
    json: bool,
) -> CmdResult {
    let catalog = db.catalog()?;
    let history = history_with(db, estimator)?;
    let records = match reference {
        Some(reference) => {
            let exercise = resolve_exercise(&catalog, reference)?;
            history.personal_records(exercise.id)?.into_iter().collect()
        }
        None => history.all_personal_records()?,
    };

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No sets logged yet.");
        return Ok(());
    }
    println!("Personal records ({} 1RM)", history.estimator());
    for pr in &records {
        let name = catalog
            .exercise(pr.exercise_id)?
            .map_or_else(|| pr.exercise_id.to_string(), |e| e.name);
        println!("  {name}");
        println!("    heaviest:   {}", format_weight(pr.max_weight));
        println!("    most reps:  {}", pr.max_reps);
        println!("    best 1RM:   {}", format_weight(pr.max_one_rep_max));
        println!(
            "    volume:     {} over {} set(s)",
            format_weight(pr.total_volume),
            pr.set_count
        );
    }
    Ok(())
}

/// Shows the 1RM trend of an exercise, oldest first.
pub fn trend(
    db: &Database,
    reference: &str,
    per_completion: bool,
    estimator: Option<&str>,
    json: bool,
) -> CmdResult {
    let exercise = resolve_exercise(&db.catalog()?, reference)?;
    let history = history_with(db, estimator)?;

    if per_completion {
        let points = history.completion_trend(exercise.id)?;
        if json {
            return print_json(&points);
        }
        for point in &points {
            println!(
                "  {}  top {}  1RM {}  volume {}",
                format_millis(point.completed_at),
                format_weight(point.top_weight),
                format_weight(point.best_one_rep_max),
                format_weight(point.volume)
            );
        }
    } else {
        let points = history.one_rep_max_trend(exercise.id)?;
        if json {
            return print_json(&points);
        }
        for point in &points {
            println!(
                "  {}  {} x {}  1RM {}",
                format_millis(point.recorded_at),
                format_weight(point.weight),
                point.reps,
                format_weight(point.one_rep_max)
            );
        }
    }
    Ok(())
}
