//! Read-side views over sessions and the set ledger.
//!
//! Nothing here writes. Views come back newest-first except trend series,
//! which are oldest-first for charting.

use crate::collection::Collection;
use crate::error::CoreResult;
use crate::model::{ExerciseCompletion, LedgerEntry, SetEntry, WorkoutSession};
use crate::one_rm::Estimator;
use crate::store::{EntityStore, IndexKey};
use crate::types::RecordId;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Best marks for one exercise across its ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalRecords {
    /// Exercise the records belong to.
    pub exercise_id: RecordId,
    /// Heaviest weight in any set.
    pub max_weight: f64,
    /// Most reps in any set.
    pub max_reps: u32,
    /// Highest estimated one-rep max of any set.
    pub max_one_rep_max: f64,
    /// Σ weight × reps.
    pub total_volume: f64,
    /// Number of sets recorded.
    pub set_count: usize,
    /// Most recent set (Unix millis).
    pub last_recorded_at: i64,
    /// Formula used for `max_one_rep_max`.
    pub estimator: Estimator,
}

/// One point of a per-set trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Ledger entry.
    pub entry_id: RecordId,
    /// When the set was recorded (Unix millis).
    pub recorded_at: i64,
    /// Weight moved.
    pub weight: f64,
    /// Reps performed.
    pub reps: u32,
    /// Estimated one-rep max.
    pub one_rep_max: f64,
}

/// One point of a per-completion trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionPoint {
    /// Completion.
    pub completion_id: RecordId,
    /// Owning session.
    pub session_id: RecordId,
    /// When it was completed (Unix millis).
    pub completed_at: i64,
    /// Heaviest set.
    pub top_weight: f64,
    /// Best estimated one-rep max among its sets.
    pub best_one_rep_max: f64,
    /// Σ weight × reps.
    pub volume: f64,
}

/// History and personal-record queries.
pub struct History<'a> {
    store: &'a EntityStore,
    estimator: Estimator,
    limit: usize,
}

impl<'a> History<'a> {
    /// Creates the view with a default estimator and history length.
    pub fn new(store: &'a EntityStore, estimator: Estimator, limit: usize) -> Self {
        Self {
            store,
            estimator,
            limit,
        }
    }

    /// Same view with another estimator.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Estimator in use.
    pub fn estimator(&self) -> Estimator {
        self.estimator
    }

    fn sessions(&self) -> Collection<'a, WorkoutSession> {
        Collection::new(self.store)
    }

    fn completions(&self) -> Collection<'a, ExerciseCompletion> {
        Collection::new(self.store)
    }

    fn ledger(&self) -> Collection<'a, LedgerEntry> {
        Collection::new(self.store)
    }

    /// Sessions dated within `[start, end]`, newest first.
    pub fn sessions_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<WorkoutSession>> {
        if start > end {
            return Ok(Vec::new());
        }
        let range = IndexKey::from(start.to_string())..=IndexKey::from(end.to_string());
        let mut sessions = self.sessions().range("date", range)?;
        sessions.reverse();
        Ok(sessions)
    }

    /// Sessions worth showing as history within `[start, end]`, newest
    /// first.
    ///
    /// Completed sessions are included, as are past in-progress sessions
    /// with at least one completion. Today's session is always included,
    /// whatever its status and even outside the range.
    pub fn history_sessions(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<WorkoutSession>> {
        let today = self.store.clock().today();
        let mut sessions = Vec::new();
        for session in self.sessions_between(start, end)? {
            let keep = session.date == today
                || session.is_completed()
                || (session.date < today && !self.completions_of(session.id)?.is_empty());
            if keep {
                sessions.push(session);
            }
        }

        if !sessions.iter().any(|s| s.date == today) {
            if let Some(current) = self
                .sessions()
                .find_by("date", today.to_string())?
                .into_iter()
                .next()
            {
                sessions.push(current);
                sessions.sort_by(|a, b| b.date.cmp(&a.date));
            }
        }
        Ok(sessions)
    }

    fn completions_of(&self, session_id: RecordId) -> CoreResult<Vec<ExerciseCompletion>> {
        self.completions().find_by("session_id", session_id)
    }

    /// Ledger entries of an exercise, oldest first with ties by id.
    fn entries(&self, exercise_id: RecordId) -> CoreResult<Vec<LedgerEntry>> {
        let mut entries = self.ledger().find_by("exercise_id", exercise_id)?;
        entries.sort_by_key(|e| (e.recorded_at, e.id));
        Ok(entries)
    }

    /// The most recent `limit` sets of an exercise (the configured default
    /// when `None`), newest first.
    pub fn exercise_history(
        &self,
        exercise_id: RecordId,
        limit: Option<usize>,
    ) -> CoreResult<Vec<LedgerEntry>> {
        let limit = limit.unwrap_or(self.limit);
        Ok(self
            .entries(exercise_id)?
            .into_iter()
            .rev()
            .take(limit)
            .collect())
    }

    /// The last set recorded for an exercise, to pre-fill the next entry.
    pub fn last_used_defaults(&self, exercise_id: RecordId) -> CoreResult<Option<SetEntry>> {
        Ok(self.entries(exercise_id)?.last().map(LedgerEntry::set))
    }

    /// Personal records for an exercise; `None` without history.
    pub fn personal_records(&self, exercise_id: RecordId) -> CoreResult<Option<PersonalRecords>> {
        Ok(self.records_from(exercise_id, &self.entries(exercise_id)?))
    }

    /// Personal records for every exercise that has ledger entries, by
    /// exercise id.
    pub fn all_personal_records(&self) -> CoreResult<Vec<PersonalRecords>> {
        let mut by_exercise: BTreeMap<RecordId, Vec<LedgerEntry>> = BTreeMap::new();
        for entry in self.ledger().all()? {
            by_exercise.entry(entry.exercise_id).or_default().push(entry);
        }
        Ok(by_exercise
            .into_iter()
            .filter_map(|(id, entries)| self.records_from(id, &entries))
            .collect())
    }

    fn records_from(
        &self,
        exercise_id: RecordId,
        entries: &[LedgerEntry],
    ) -> Option<PersonalRecords> {
        if entries.is_empty() {
            return None;
        }
        let mut records = PersonalRecords {
            exercise_id,
            max_weight: 0.0,
            max_reps: 0,
            max_one_rep_max: 0.0,
            total_volume: 0.0,
            set_count: entries.len(),
            last_recorded_at: i64::MIN,
            estimator: self.estimator,
        };
        for entry in entries {
            records.max_weight = records.max_weight.max(entry.weight);
            records.max_reps = records.max_reps.max(entry.reps);
            records.max_one_rep_max = records
                .max_one_rep_max
                .max(self.estimator.estimate(entry.weight, entry.reps));
            records.total_volume += entry.set().volume();
            records.last_recorded_at = records.last_recorded_at.max(entry.recorded_at);
        }
        Some(records)
    }

    /// Estimated one-rep max of every set, oldest first.
    pub fn one_rep_max_trend(&self, exercise_id: RecordId) -> CoreResult<Vec<TrendPoint>> {
        Ok(self
            .entries(exercise_id)?
            .into_iter()
            .map(|e| TrendPoint {
                entry_id: e.id,
                recorded_at: e.recorded_at,
                weight: e.weight,
                reps: e.reps,
                one_rep_max: self.estimator.estimate(e.weight, e.reps),
            })
            .collect())
    }

    /// Best estimate, top weight and volume of every completion of an
    /// exercise, oldest first.
    pub fn completion_trend(&self, exercise_id: RecordId) -> CoreResult<Vec<CompletionPoint>> {
        let mut completions = self.completions().find_by("exercise_id", exercise_id)?;
        completions.sort_by_key(|c| (c.completed_at, c.id));
        Ok(completions
            .into_iter()
            .map(|c| CompletionPoint {
                completion_id: c.id,
                session_id: c.session_id,
                completed_at: c.completed_at,
                top_weight: c.sets.iter().map(|s| s.weight).fold(0.0, f64::max),
                best_one_rep_max: c
                    .sets
                    .iter()
                    .map(|s| self.estimator.estimate(s.weight, s.reps))
                    .fold(0.0, f64::max),
                volume: c.volume(),
            })
            .collect())
    }

    /// Total volume of a session's completions.
    pub fn session_volume(&self, session_id: RecordId) -> CoreResult<f64> {
        Ok(self
            .completions_of(session_id)?
            .iter()
            .map(ExerciseCompletion::volume)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SetEntry;
    use crate::test_support::{db_on, monday, seed_chest};
    use crate::{Database, FixedClock};
    use chrono::Days;

    fn days_before(n: u64) -> NaiveDate {
        monday().checked_sub_days(Days::new(n)).unwrap()
    }

    /// Completes `sets` for `exercise` in a fresh session on `day`.
    fn train(
        db: &Database,
        clock: &FixedClock,
        day: NaiveDate,
        exercise: RecordId,
        sets: Vec<SetEntry>,
    ) -> WorkoutSession {
        clock.set_day(day);
        let sessions = db.sessions().unwrap();
        let session = sessions.get_or_create_today("chest").unwrap();
        sessions.complete_exercise(exercise, sets).unwrap();
        session
    }

    #[test]
    fn range_listing_skips_empty_past_sessions() {
        let (db, clock, _) = db_on(days_before(3));
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();

        // completed three days ago
        let sets = vec![SetEntry::new(100.0, 5)];
        let done = train(&db, &clock, days_before(3), bench, sets);
        sessions.complete_session(done.id).unwrap();

        // left empty two days ago
        clock.set_day(days_before(2));
        let empty = sessions.get_or_create_today("chest").unwrap();

        clock.set_day(monday());
        let history = db.history().unwrap();
        let listed: Vec<RecordId> = history
            .history_sessions(days_before(7), days_before(1))
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(listed, [done.id]);

        // the forgotten session gains a completion and counts from then on
        clock.set_day(days_before(2));
        sessions
            .complete_exercise(bench, vec![SetEntry::new(105.0, 5)])
            .unwrap();
        clock.set_day(monday());
        let listed: Vec<RecordId> = history
            .history_sessions(days_before(7), days_before(1))
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(listed, [empty.id, done.id]);

        // plain listing returns everything, newest first
        assert_eq!(
            history
                .sessions_between(days_before(7), monday())
                .unwrap()
                .len(),
            2
        );
        assert!(history
            .sessions_between(monday(), days_before(1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn todays_session_is_always_listed() {
        let (db, _, _) = db_on(monday());
        seed_chest(&db);
        let today = db.sessions().unwrap().get_or_create_today("chest").unwrap();

        let history = db.history().unwrap();
        let listed = history
            .history_sessions(days_before(10), days_before(5))
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, today.id);
        assert_eq!(listed[0].status, crate::SessionStatus::InProgress);
    }

    #[test]
    fn exercise_history_and_defaults() {
        let (db, clock, _) = db_on(days_before(2));
        let bench = seed_chest(&db);
        let history = db.history().unwrap();
        assert!(history.last_used_defaults(bench).unwrap().is_none());
        assert!(history.personal_records(bench).unwrap().is_none());

        let sets = vec![SetEntry::new(100.0, 8), SetEntry::new(110.0, 5)];
        train(&db, &clock, days_before(2), bench, sets);
        let sets = vec![SetEntry::new(115.0, 3).with_rpe(9)];
        train(&db, &clock, days_before(1), bench, sets);

        let entries = history.exercise_history(bench, None).unwrap();
        let weights: Vec<f64> = entries.iter().map(|e| e.weight).collect();
        assert_eq!(weights, [115.0, 110.0, 100.0]);
        assert_eq!(history.exercise_history(bench, Some(1)).unwrap().len(), 1);

        let defaults = history.last_used_defaults(bench).unwrap().unwrap();
        assert_eq!(defaults, SetEntry::new(115.0, 3).with_rpe(9));
    }

    #[test]
    fn personal_records_across_ledger() {
        let (db, clock, _) = db_on(days_before(2));
        let bench = seed_chest(&db);
        let sets = vec![SetEntry::new(100.0, 10), SetEntry::new(100.0, 5)];
        train(&db, &clock, days_before(2), bench, sets);
        train(&db, &clock, days_before(1), bench, vec![SetEntry::new(120.0, 2)]);

        let history = db.history().unwrap();
        let prs = history.personal_records(bench).unwrap().unwrap();
        assert_eq!(prs.max_weight, 120.0);
        assert_eq!(prs.max_reps, 10);
        // 100 x 10 → 133 beats 120 x 2 → 128
        assert_eq!(prs.max_one_rep_max, 133.0);
        assert_eq!(prs.total_volume, 1000.0 + 500.0 + 240.0);
        assert_eq!(prs.set_count, 3);
        assert_eq!(prs.estimator, Estimator::Epley);

        let brzycki = history
            .with_estimator(Estimator::Brzycki)
            .personal_records(bench)
            .unwrap()
            .unwrap();
        assert_eq!(brzycki.estimator, Estimator::Brzycki);

        let all = db.history().unwrap().all_personal_records().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].exercise_id, bench);
    }

    #[test]
    fn trends_run_oldest_first() {
        let (db, clock, _) = db_on(days_before(2));
        let bench = seed_chest(&db);
        let sets = vec![SetEntry::new(100.0, 5), SetEntry::new(90.0, 8)];
        let first = train(&db, &clock, days_before(2), bench, sets);
        let second = train(&db, &clock, days_before(1), bench, vec![SetEntry::new(105.0, 4)]);

        let history = db.history().unwrap();
        let points = history.one_rep_max_trend(bench).unwrap();
        let estimates: Vec<f64> = points.iter().map(|p| p.one_rep_max).collect();
        assert_eq!(estimates, [117.0, 114.0, 119.0]);

        let completions = history.completion_trend(bench).unwrap();
        assert_eq!(completions.len(), 2);
        assert_eq!(completions[0].session_id, first.id);
        assert_eq!(completions[0].top_weight, 100.0);
        assert_eq!(completions[0].best_one_rep_max, 117.0);
        assert_eq!(completions[0].volume, 500.0 + 720.0);
        assert_eq!(completions[1].session_id, second.id);

        assert_eq!(history.session_volume(second.id).unwrap(), 420.0);
    }
}
