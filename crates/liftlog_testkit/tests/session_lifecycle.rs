//! Session lifecycle and history behaviour through the public API.

use liftlog_core::{Clock, CoreError, Exercise, MuscleGroup, SessionStatus, SetEntry};
use liftlog_testkit::prelude::*;

#[test]
fn chest_bench_scenario() {
    let db = TestDatabase::memory();
    let catalog = db.catalog().unwrap();
    catalog
        .create_muscle_group(MuscleGroup::new("Chest"))
        .unwrap();
    let bench = catalog
        .create_exercise(Exercise::new("Bench", "Chest"))
        .unwrap()
        .id;

    let sessions = db.sessions().unwrap();
    let session = sessions.get_or_create_today("Chest").unwrap();
    assert_eq!(session.status, SessionStatus::InProgress);

    assert!(!sessions.is_exercise_completed_today(bench).unwrap());
    sessions
        .complete_exercise(bench, vec![SetEntry::new(135.0, 5)])
        .unwrap();
    assert!(sessions.is_exercise_completed_today(bench).unwrap());

    let completed = sessions.complete_session(session.id).unwrap();
    assert_eq!(completed.status, SessionStatus::Completed);
    let again = sessions.complete_session(session.id).unwrap();
    assert_eq!(again.status, SessionStatus::Completed);
    assert_eq!(again.updated_at, completed.updated_at);
}

#[test]
fn history_range_includes_sessions_once_they_have_work() {
    let db = TestDatabase::memory();
    let catalog = scenarios::catalog(&db);
    let sessions = db.sessions().unwrap();
    let history = db.history().unwrap();

    // Monday: a finished session
    let monday = db.clock.today();
    let finished = sessions.get_or_create_today("chest").unwrap();
    sessions
        .complete_exercise(catalog.bench, vec![SetEntry::new(135.0, 5)])
        .unwrap();
    sessions.complete_session(finished.id).unwrap();

    // Tuesday: started, nothing logged
    let tuesday = db.advance_days(1);
    let abandoned = sessions.get_or_create_today("back").unwrap();

    // Thursday: look back over Monday..Wednesday
    db.advance_days(2);
    let listed = history
        .history_sessions(monday, tuesday.succ_opt().unwrap())
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, finished.id);

    // Back on Tuesday, one exercise gets logged after all
    db.clock.set_day(tuesday);
    sessions
        .complete_exercise(catalog.row, vec![SetEntry::new(95.0, 8)])
        .unwrap();
    db.advance_days(2);

    let listed = history
        .history_sessions(monday, tuesday.succ_opt().unwrap())
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, [abandoned.id, finished.id]);
}

#[test]
fn repeated_selection_never_duplicates_the_day() {
    let db = TestDatabase::memory();
    scenarios::catalog(&db);
    let sessions = db.sessions().unwrap();

    for group in ["chest", "back", "chest", "back", "back"] {
        let session = sessions.get_or_create_today(group).unwrap();
        assert_eq!(session.muscle_group, group);
    }
    let today = db.clock.today();
    let all = db.history().unwrap().sessions_between(today, today).unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn completing_without_a_session_is_recoverable() {
    let db = TestDatabase::memory();
    let catalog = scenarios::catalog(&db);
    let err = db
        .sessions()
        .unwrap()
        .complete_exercise(catalog.bench, vec![SetEntry::new(135.0, 5)])
        .unwrap_err();
    assert!(matches!(err, CoreError::NoSession { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn duplicate_completion_keeps_the_first() {
    let db = TestDatabase::memory();
    let day = scenarios::chest_day(&db);
    let sessions = db.sessions().unwrap();

    let err = sessions
        .complete_exercise(day.bench, vec![SetEntry::new(185.0, 1)])
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateCompletion { .. }));

    let completions = sessions.completions_for(day.session.id).unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].sets[0].weight, 135.0);

    let prs = db.history().unwrap().personal_records(day.bench).unwrap().unwrap();
    assert_eq!(prs.max_weight, 135.0);
    assert_eq!(prs.set_count, 2);
}

#[test]
fn a_completion_is_one_frame() {
    let db = TestDatabase::memory();
    let catalog = scenarios::catalog(&db);
    let sessions = db.sessions().unwrap();
    sessions.get_or_create_today("chest").unwrap();

    let frames = db.store().log_frames();
    let sets = vec![
        SetEntry::new(135.0, 5),
        SetEntry::new(145.0, 3),
        SetEntry::new(155.0, 1),
    ];
    sessions.complete_exercise(catalog.bench, sets).unwrap();
    assert_eq!(db.store().log_frames(), frames + 1);
}

#[test]
fn sessions_survive_reopen_on_disk() {
    let db = TestDatabase::file();
    let day = scenarios::chest_day(&db);
    let db = db.reopen();

    let sessions = db.sessions().unwrap();
    assert!(sessions.is_exercise_completed_today(day.bench).unwrap());
    assert_eq!(
        sessions.today_session().unwrap().unwrap().id,
        day.session.id
    );
    // ids keep ascending after a restart
    let next = db
        .catalog()
        .unwrap()
        .create_muscle_group(MuscleGroup::new("legs"))
        .unwrap();
    assert!(next.id > day.session.id);
}

#[test]
fn last_used_defaults_prefill_the_next_entry() {
    let db = TestDatabase::memory();
    let day = scenarios::chest_day(&db);
    db.advance_days(2);

    let sessions = db.sessions().unwrap();
    sessions.get_or_create_today("chest").unwrap();
    let history = db.history().unwrap();
    let defaults = history.last_used_defaults(day.bench).unwrap().unwrap();
    assert_eq!(defaults, SetEntry::new(135.0, 5));

    sessions
        .complete_exercise(day.bench, vec![SetEntry::new(140.0, 5).with_rpe(8)])
        .unwrap();
    let defaults = history.last_used_defaults(day.bench).unwrap().unwrap();
    assert_eq!(defaults, SetEntry::new(140.0, 5).with_rpe(8));
}
