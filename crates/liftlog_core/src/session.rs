//! Daily session lifecycle.
//!
//! ```text
//! NoSession ──get_or_create_today──▶ InProgress ──complete_session──▶ Completed
//! ```
//!
//! A calendar day has at most one session and a session has at most one
//! completion per exercise. Every operation runs under the database's
//! session lock, so the read-then-write steps cannot interleave.

use crate::catalog::Catalog;
use crate::collection::{Collection, Record};
use crate::error::{CoreError, CoreResult};
use crate::model::{
    validate_sets, Exercise, ExerciseCompletion, LedgerEntry, SessionStatus, SetEntry,
    WorkoutSession,
};
use crate::store::{EntityStore, WriteBatch};
use crate::types::{Document, RecordId};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// A session together with its completions, in completion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    /// The session.
    pub session: WorkoutSession,
    /// Its completions.
    pub completions: Vec<ExerciseCompletion>,
}

impl SessionDetail {
    /// Total volume across all completions.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.completions.iter().map(ExerciseCompletion::volume).sum()
    }
}

/// Session state machine over the store.
pub struct SessionLifecycle<'a> {
    store: &'a EntityStore,
    lock: &'a Mutex<()>,
}

impl<'a> SessionLifecycle<'a> {
    /// Creates the lifecycle view. `lock` must be shared by every view of
    /// the same store.
    pub fn new(store: &'a EntityStore, lock: &'a Mutex<()>) -> Self {
        Self { store, lock }
    }

    fn sessions(&self) -> Collection<'a, WorkoutSession> {
        Collection::new(self.store)
    }

    fn completions(&self) -> Collection<'a, ExerciseCompletion> {
        Collection::new(self.store)
    }

    fn today(&self) -> NaiveDate {
        self.store.clock().today()
    }

    /// The session for `date`, if one exists.
    pub fn session_on(&self, date: NaiveDate) -> CoreResult<Option<WorkoutSession>> {
        Ok(self
            .sessions()
            .find_by("date", date.to_string())?
            .into_iter()
            .next())
    }

    /// Today's session, if one exists.
    pub fn today_session(&self) -> CoreResult<Option<WorkoutSession>> {
        self.session_on(self.today())
    }

    /// Returns today's session, creating it or switching its muscle group.
    ///
    /// Switching the group keeps the session's completions and status.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the muscle group is unknown.
    pub fn get_or_create_today(&self, muscle_group: &str) -> CoreResult<WorkoutSession> {
        let _guard = self.lock.lock();

        if Catalog::new(self.store)
            .muscle_group_by_identifier(muscle_group)?
            .is_none()
        {
            return Err(CoreError::validation(format!(
                "unknown muscle group {muscle_group}"
            )));
        }

        let today = self.today();
        match self.session_on(today)? {
            None => {
                let mut session = WorkoutSession::new(today, muscle_group);
                self.sessions().insert(&mut session)?;
                tracing::info!(id = %session.id, date = %today, muscle_group, "started session");
                Ok(session)
            }
            Some(session) if session.muscle_group == muscle_group => Ok(session),
            Some(session) => {
                let mut changes = Document::new();
                changes.insert("muscle_group".into(), Value::from(muscle_group));
                let updated = self.sessions().update(session.id, &changes)?;
                tracing::info!(
                    id = %session.id,
                    from = %session.muscle_group,
                    to = muscle_group,
                    "switched session muscle group"
                );
                Ok(updated)
            }
        }
    }

    /// Records `sets` for an exercise in today's session and copies each
    /// set to the ledger, all in one write.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for an empty or out-of-range set list
    /// - [`CoreError::NoSession`] if today has no session
    /// - [`CoreError::NotFound`] if the exercise doesn't exist
    /// - [`CoreError::DuplicateCompletion`] if it was already completed
    pub fn complete_exercise(
        &self,
        exercise_id: RecordId,
        sets: Vec<SetEntry>,
    ) -> CoreResult<ExerciseCompletion> {
        let _guard = self.lock.lock();
        validate_sets(&sets)?;

        let today = self.today();
        let session = self
            .session_on(today)?
            .ok_or(CoreError::NoSession { date: today })?;

        if !Collection::<Exercise>::new(self.store).exists(exercise_id)? {
            return Err(CoreError::not_found(Exercise::COLLECTION, exercise_id));
        }
        if self.find_completion(session.id, exercise_id)?.is_some() {
            return Err(CoreError::DuplicateCompletion {
                session_id: session.id,
                exercise_id,
            });
        }

        let now = self.store.clock().now_millis();
        let completion = ExerciseCompletion {
            id: RecordId::default(),
            session_id: session.id,
            exercise_id,
            sets,
            completed_at: now,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new();
        self.completions().insert_in_batch(&mut batch, &completion)?;
        let ledger = Collection::<LedgerEntry>::new(self.store);
        for set in &completion.sets {
            let entry = LedgerEntry::from_set(exercise_id, Some(session.id), set, now);
            ledger.insert_in_batch(&mut batch, &entry)?;
        }

        let ids = self.store.commit(batch)?;
        let id = ids
            .first()
            .copied()
            .ok_or_else(|| CoreError::invalid_operation("completion was not assigned an id"))?;
        tracing::info!(
            session = %session.id,
            exercise = %exercise_id,
            sets = completion.sets.len(),
            "completed exercise"
        );
        self.completions().require(id)
    }

    /// Marks a session completed. Completing it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown session.
    pub fn complete_session(&self, session_id: RecordId) -> CoreResult<WorkoutSession> {
        let _guard = self.lock.lock();
        let session = self.sessions().require(session_id)?;
        if session.is_completed() {
            return Ok(session);
        }

        let mut changes = Document::new();
        changes.insert(
            "status".into(),
            Value::from(SessionStatus::Completed.as_str()),
        );
        let updated = self.sessions().update(session_id, &changes)?;
        tracing::info!(id = %session_id, date = %updated.date, "completed session");
        Ok(updated)
    }

    /// Whether today's session has a completion for the exercise.
    pub fn is_exercise_completed_today(&self, exercise_id: RecordId) -> CoreResult<bool> {
        match self.today_session()? {
            Some(session) => Ok(self.find_completion(session.id, exercise_id)?.is_some()),
            None => Ok(false),
        }
    }

    /// Completions in today's session; empty when there is none.
    pub fn today_completions(&self) -> CoreResult<Vec<ExerciseCompletion>> {
        match self.today_session()? {
            Some(session) => self.completions_for(session.id),
            None => Ok(Vec::new()),
        }
    }

    /// Completions of a session, in completion order.
    pub fn completions_for(&self, session_id: RecordId) -> CoreResult<Vec<ExerciseCompletion>> {
        self.completions().find_by("session_id", session_id)
    }

    /// A session with its completions.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown session.
    pub fn session_with_completions(&self, session_id: RecordId) -> CoreResult<SessionDetail> {
        let session = self.sessions().require(session_id)?;
        let completions = self.completions_for(session_id)?;
        Ok(SessionDetail {
            session,
            completions,
        })
    }

    /// Deletes a session and its completions. Ledger entries stay.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] for an unknown session.
    pub fn delete_session(&self, session_id: RecordId) -> CoreResult<()> {
        let _guard = self.lock.lock();
        self.sessions().require(session_id)?;

        let completions = self.completions_for(session_id)?;
        let mut batch = WriteBatch::new();
        for completion in &completions {
            batch.delete(ExerciseCompletion::COLLECTION, completion.id);
        }
        batch.delete(WorkoutSession::COLLECTION, session_id);
        self.store.commit(batch)?;

        tracing::info!(
            id = %session_id,
            completions = completions.len(),
            "deleted session"
        );
        Ok(())
    }

    fn find_completion(
        &self,
        session_id: RecordId,
        exercise_id: RecordId,
    ) -> CoreResult<Option<ExerciseCompletion>> {
        Ok(self
            .completions_for(session_id)?
            .into_iter()
            .find(|c| c.exercise_id == exercise_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MuscleGroup;
    use crate::test_support::{db_on, monday, seed_chest};

    fn bench_sets() -> Vec<SetEntry> {
        vec![SetEntry::new(135.0, 5), SetEntry::new(135.0, 4).with_rpe(9)]
    }

    #[test]
    fn chest_day_scenario() {
        let (db, _, _) = db_on(monday());
        let catalog = db.catalog().unwrap();
        catalog
            .create_muscle_group(MuscleGroup::new("Chest"))
            .unwrap();
        let bench = catalog
            .create_exercise(Exercise::new("Bench", "Chest"))
            .unwrap();
        let sessions = db.sessions().unwrap();

        let session = sessions.get_or_create_today("Chest").unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.date, monday());

        assert!(!sessions.is_exercise_completed_today(bench.id).unwrap());
        sessions
            .complete_exercise(bench.id, vec![SetEntry::new(135.0, 5)])
            .unwrap();
        assert!(sessions.is_exercise_completed_today(bench.id).unwrap());

        let done = sessions.complete_session(session.id).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        let again = sessions.complete_session(session.id).unwrap();
        assert_eq!(again, done);
    }

    #[test]
    fn one_session_per_day() {
        let (db, _, _) = db_on(monday());
        seed_chest(&db);
        db.catalog()
            .unwrap()
            .create_muscle_group(MuscleGroup::new("back"))
            .unwrap();
        let sessions = db.sessions().unwrap();

        let first = sessions.get_or_create_today("chest").unwrap();
        let same = sessions.get_or_create_today("chest").unwrap();
        assert_eq!(first, same);

        let switched = sessions.get_or_create_today("back").unwrap();
        assert_eq!(switched.id, first.id);
        assert_eq!(switched.muscle_group, "back");
        assert_eq!(db.store().count(WorkoutSession::COLLECTION).unwrap(), 1);
    }

    #[test]
    fn switching_group_keeps_completions() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        db.catalog()
            .unwrap()
            .create_muscle_group(MuscleGroup::new("back"))
            .unwrap();
        let sessions = db.sessions().unwrap();
        sessions.get_or_create_today("chest").unwrap();
        sessions.complete_exercise(bench, bench_sets()).unwrap();

        sessions.get_or_create_today("back").unwrap();
        assert_eq!(sessions.today_completions().unwrap().len(), 1);
    }

    #[test]
    fn unknown_group_is_rejected() {
        let (db, _, _) = db_on(monday());
        let err = db
            .sessions()
            .unwrap()
            .get_or_create_today("legs")
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn completion_needs_a_session() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let err = db
            .sessions()
            .unwrap()
            .complete_exercise(bench, bench_sets())
            .unwrap_err();
        assert!(matches!(err, CoreError::NoSession { date } if date == monday()));
    }

    #[test]
    fn completion_validates_sets_and_exercise() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();
        sessions.get_or_create_today("chest").unwrap();

        assert!(matches!(
            sessions.complete_exercise(bench, Vec::new()),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            sessions.complete_exercise(bench, vec![SetEntry::new(0.0, 5)]),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            sessions.complete_exercise(bench, vec![SetEntry::new(100.0, 5).with_rpe(11)]),
            Err(CoreError::Validation { .. })
        ));
        assert!(matches!(
            sessions.complete_exercise(RecordId::new(999), bench_sets()),
            Err(CoreError::NotFound { .. })
        ));
        // nothing reached the ledger
        assert_eq!(db.store().count(LedgerEntry::COLLECTION).unwrap(), 0);
    }

    #[test]
    fn duplicate_completion_is_rejected() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();
        let session = sessions.get_or_create_today("chest").unwrap();
        sessions.complete_exercise(bench, bench_sets()).unwrap();

        let err = sessions
            .complete_exercise(bench, vec![SetEntry::new(140.0, 3)])
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DuplicateCompletion { session_id, exercise_id }
                if session_id == session.id && exercise_id == bench
        ));
        assert_eq!(sessions.completions_for(session.id).unwrap().len(), 1);
        assert_eq!(db.store().count(LedgerEntry::COLLECTION).unwrap(), 2);
    }

    #[test]
    fn completion_copies_sets_to_ledger() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();
        let session = sessions.get_or_create_today("chest").unwrap();
        let frames = db.store().log_frames();

        let completion = sessions.complete_exercise(bench, bench_sets()).unwrap();
        assert_eq!(db.store().log_frames(), frames + 1);
        assert_eq!(completion.session_id, session.id);
        assert_eq!(completion.sets, bench_sets());

        let ledger = Collection::<LedgerEntry>::new(db.store())
            .find_by("exercise_id", bench)
            .unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.iter().all(|e| e.session_id == Some(session.id)));
        assert!(ledger.iter().all(|e| e.recorded_at == completion.completed_at));
        assert_eq!(ledger[1].rpe, Some(9));
    }

    #[test]
    fn new_day_starts_without_session() {
        let (db, clock, _) = db_on(monday());
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();
        sessions.get_or_create_today("chest").unwrap();
        sessions.complete_exercise(bench, bench_sets()).unwrap();

        clock.set_day(monday().succ_opt().unwrap());
        assert!(sessions.today_session().unwrap().is_none());
        assert!(!sessions.is_exercise_completed_today(bench).unwrap());
        assert!(sessions.today_completions().unwrap().is_empty());

        let tuesday = sessions.get_or_create_today("chest").unwrap();
        assert_eq!(tuesday.date, monday().succ_opt().unwrap());
        sessions.complete_exercise(bench, bench_sets()).unwrap();
        assert_eq!(db.store().count(WorkoutSession::COLLECTION).unwrap(), 2);
    }

    #[test]
    fn delete_session_cascades_to_completions_only() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();
        let session = sessions.get_or_create_today("chest").unwrap();
        sessions.complete_exercise(bench, bench_sets()).unwrap();

        let detail = sessions.session_with_completions(session.id).unwrap();
        assert_eq!(detail.completions.len(), 1);
        assert!((detail.volume() - (135.0 * 5.0 + 135.0 * 4.0)).abs() < f64::EPSILON);

        sessions.delete_session(session.id).unwrap();
        assert!(sessions.today_session().unwrap().is_none());
        assert_eq!(db.store().count(ExerciseCompletion::COLLECTION).unwrap(), 0);
        assert_eq!(db.store().count(LedgerEntry::COLLECTION).unwrap(), 2);
        assert!(matches!(
            sessions.delete_session(session.id),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn complete_unknown_session_is_not_found() {
        let (db, _, _) = db_on(monday());
        let err = db
            .sessions()
            .unwrap()
            .complete_session(RecordId::new(77))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
