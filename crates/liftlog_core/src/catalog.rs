//! Muscle groups and exercises.

use crate::collection::{Collection, Record};
use crate::error::{CoreError, CoreResult};
use crate::model::{
    Exercise, ExerciseCompletion, ExercisePatch, LedgerEntry, MuscleGroup, MuscleGroupPatch,
    RetiredIdentifier, WorkoutSession,
};
use crate::store::{EntityStore, WriteBatch};
use crate::types::RecordId;

/// Catalog operations.
pub struct Catalog<'a> {
    store: &'a EntityStore,
}

impl<'a> Catalog<'a> {
    /// Creates a catalog over `store`.
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    fn groups(&self) -> Collection<'a, MuscleGroup> {
        Collection::new(self.store)
    }

    fn exercises(&self) -> Collection<'a, Exercise> {
        Collection::new(self.store)
    }

    fn retired(&self) -> Collection<'a, RetiredIdentifier> {
        Collection::new(self.store)
    }

    // ------------------------------------------------------------------
    // Muscle groups
    // ------------------------------------------------------------------

    /// Adds a muscle group.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the identifier is blank, taken,
    /// or belonged to a deleted group.
    pub fn create_muscle_group(&self, mut group: MuscleGroup) -> CoreResult<MuscleGroup> {
        group.identifier = group.identifier.trim().to_string();
        group.validate()?;
        if self.muscle_group_by_identifier(&group.identifier)?.is_some() {
            return Err(CoreError::validation(format!(
                "muscle group {} already exists",
                group.identifier
            )));
        }
        if self.is_retired(&group.identifier)? {
            return Err(CoreError::validation(format!(
                "muscle group identifier {} belonged to a deleted group",
                group.identifier
            )));
        }
        self.groups().insert(&mut group)?;
        tracing::debug!(id = %group.id, identifier = %group.identifier, "created muscle group");
        Ok(group)
    }

    /// Changes a muscle group's display fields. The identifier is fixed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] or a validation error.
    pub fn update_muscle_group(
        &self,
        id: RecordId,
        patch: &MuscleGroupPatch,
    ) -> CoreResult<MuscleGroup> {
        self.groups().update(id, patch)
    }

    /// Deletes a muscle group and retires its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`], or [`CoreError::Validation`] while
    /// exercises or sessions still reference it.
    pub fn delete_muscle_group(&self, id: RecordId) -> CoreResult<()> {
        let group = self.groups().require(id)?;
        let exercises = self.exercises_by_muscle_group(&group.identifier)?.len();
        let sessions = Collection::<WorkoutSession>::new(self.store)
            .all()?
            .iter()
            .filter(|s| s.muscle_group == group.identifier)
            .count();
        if exercises > 0 || sessions > 0 {
            return Err(CoreError::validation(format!(
                "muscle group {} is used by {exercises} exercise(s) and {sessions} session(s)",
                group.identifier
            )));
        }

        let mut batch = WriteBatch::new();
        batch.delete(MuscleGroup::COLLECTION, id);
        self.retired()
            .insert_in_batch(&mut batch, &RetiredIdentifier::new(&group.identifier))?;
        self.store.commit(batch)?;
        tracing::debug!(id = %id, identifier = %group.identifier, "deleted muscle group");
        Ok(())
    }

    /// Whether `identifier` belonged to a deleted group.
    pub fn is_retired(&self, identifier: &str) -> CoreResult<bool> {
        Ok(!self.retired().find_by("identifier", identifier)?.is_empty())
    }

    /// Gets a muscle group by id.
    pub fn muscle_group(&self, id: RecordId) -> CoreResult<Option<MuscleGroup>> {
        self.groups().get(id)
    }

    /// Gets a muscle group by its identifier.
    pub fn muscle_group_by_identifier(&self, identifier: &str) -> CoreResult<Option<MuscleGroup>> {
        Ok(self
            .groups()
            .find_by("identifier", identifier)?
            .into_iter()
            .next())
    }

    /// Every muscle group by sort order, then id.
    pub fn muscle_groups(&self) -> CoreResult<Vec<MuscleGroup>> {
        self.groups().range("sort_order", ..)
    }

    /// Active muscle groups by sort order, then id.
    pub fn active_muscle_groups(&self) -> CoreResult<Vec<MuscleGroup>> {
        Ok(self
            .muscle_groups()?
            .into_iter()
            .filter(|g| g.is_active)
            .collect())
    }

    // ------------------------------------------------------------------
    // Exercises
    // ------------------------------------------------------------------

    /// Adds an exercise to an existing muscle group.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for a blank name or an unknown
    /// muscle group.
    pub fn create_exercise(&self, mut exercise: Exercise) -> CoreResult<Exercise> {
        exercise.name = exercise.name.trim().to_string();
        exercise.validate()?;
        if self.muscle_group_by_identifier(&exercise.muscle_group)?.is_none() {
            return Err(CoreError::validation(format!(
                "unknown muscle group {}",
                exercise.muscle_group
            )));
        }
        self.exercises().insert(&mut exercise)?;
        tracing::debug!(id = %exercise.id, name = %exercise.name, "created exercise");
        Ok(exercise)
    }

    /// Changes an exercise's name, aliases, unit or link.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] or a validation error.
    pub fn update_exercise(&self, id: RecordId, patch: &ExercisePatch) -> CoreResult<Exercise> {
        let mut patch = patch.clone();
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
        }
        self.exercises().update(id, &patch)
    }

    /// Deletes an exercise.
    ///
    /// Completions and ledger entries that reference it are kept; their
    /// exercise id dangles from then on.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if it doesn't exist.
    pub fn delete_exercise(&self, id: RecordId) -> CoreResult<()> {
        self.exercises().delete(id)?;

        let completions = self
            .store
            .find_by(ExerciseCompletion::COLLECTION, "exercise_id", id)?
            .len();
        let ledger = self
            .store
            .find_by(LedgerEntry::COLLECTION, "exercise_id", id)?
            .len();
        if completions > 0 || ledger > 0 {
            tracing::warn!(
                exercise = %id,
                completions,
                ledger,
                "deleted exercise is still referenced by history"
            );
        }
        Ok(())
    }

    /// Gets an exercise by id.
    pub fn exercise(&self, id: RecordId) -> CoreResult<Option<Exercise>> {
        self.exercises().get(id)
    }

    /// Every exercise in id order.
    pub fn all_exercises(&self) -> CoreResult<Vec<Exercise>> {
        self.exercises().all()
    }

    /// Exercises filed under a muscle group identifier.
    pub fn exercises_by_muscle_group(&self, identifier: &str) -> CoreResult<Vec<Exercise>> {
        self.exercises().find_by("muscle_group", identifier)
    }

    /// First exercise whose name or alias matches, case-insensitively.
    pub fn find_exercise_by_name(&self, name: &str) -> CoreResult<Option<Exercise>> {
        Ok(self
            .exercises()
            .range("name", ..)?
            .into_iter()
            .find(|e| e.answers_to(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SetEntry, WeightUnit};
    use crate::test_support::{db_on, monday, seed_chest};

    #[test]
    fn muscle_group_identifiers_are_unique() {
        let (db, _, _) = db_on(monday());
        let catalog = db.catalog().unwrap();
        catalog
            .create_muscle_group(MuscleGroup::new("legs"))
            .unwrap();
        let err = catalog
            .create_muscle_group(MuscleGroup::new(" legs "))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(catalog
            .create_muscle_group(MuscleGroup::new("  "))
            .is_err());
    }

    #[test]
    fn active_groups_follow_sort_order() {
        let (db, _, _) = db_on(monday());
        let catalog = db.catalog().unwrap();
        let back = catalog
            .create_muscle_group(MuscleGroup::new("back").with_sort_order(2))
            .unwrap();
        catalog
            .create_muscle_group(MuscleGroup::new("chest").with_sort_order(1))
            .unwrap();
        catalog
            .create_muscle_group(MuscleGroup::new("arms").with_sort_order(3))
            .unwrap();

        let patch = MuscleGroupPatch {
            is_active: Some(false),
            ..MuscleGroupPatch::default()
        };
        catalog.update_muscle_group(back.id, &patch).unwrap();

        let all: Vec<String> = catalog
            .muscle_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.identifier)
            .collect();
        assert_eq!(all, ["chest", "back", "arms"]);

        let active: Vec<String> = catalog
            .active_muscle_groups()
            .unwrap()
            .into_iter()
            .map(|g| g.identifier)
            .collect();
        assert_eq!(active, ["chest", "arms"]);
    }

    #[test]
    fn exercise_requires_known_group() {
        let (db, _, _) = db_on(monday());
        let err = db
            .catalog()
            .unwrap()
            .create_exercise(Exercise::new("Squat", "legs"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn find_by_name_or_alias() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let catalog = db.catalog().unwrap();

        assert_eq!(
            catalog.find_exercise_by_name("BENCH PRESS").unwrap().unwrap().id,
            bench
        );
        assert_eq!(catalog.find_exercise_by_name("bench").unwrap().unwrap().id, bench);
        assert!(catalog.find_exercise_by_name("squat").unwrap().is_none());
        assert_eq!(catalog.exercises_by_muscle_group("chest").unwrap().len(), 1);
    }

    #[test]
    fn exercise_patch_sets_and_clears_fields() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let catalog = db.catalog().unwrap();

        let patch = ExercisePatch {
            preferred_unit: Some(Some(WeightUnit::Lb)),
            demo_url: Some(Some("https://example.com/bench".into())),
            ..ExercisePatch::default()
        };
        let updated = catalog.update_exercise(bench, &patch).unwrap();
        assert_eq!(updated.preferred_unit, Some(WeightUnit::Lb));

        let clear = ExercisePatch {
            demo_url: Some(None),
            ..ExercisePatch::default()
        };
        let updated = catalog.update_exercise(bench, &clear).unwrap();
        assert_eq!(updated.demo_url, None);
        assert_eq!(updated.preferred_unit, Some(WeightUnit::Lb));
        assert_eq!(updated.name, "Bench Press");
    }

    #[test]
    fn referenced_group_cannot_be_deleted() {
        let (db, _, _) = db_on(monday());
        seed_chest(&db);
        let catalog = db.catalog().unwrap();
        let chest = catalog.muscle_group_by_identifier("chest").unwrap().unwrap();

        let err = catalog.delete_muscle_group(chest.id).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));

        let empty = catalog
            .create_muscle_group(MuscleGroup::new("calves"))
            .unwrap();
        catalog.delete_muscle_group(empty.id).unwrap();
        assert!(catalog.muscle_group(empty.id).unwrap().is_none());
    }

    #[test]
    fn deleted_group_identifier_stays_retired() {
        let (db, _, _) = db_on(monday());
        let catalog = db.catalog().unwrap();
        let legs = catalog
            .create_muscle_group(MuscleGroup::new("legs"))
            .unwrap();
        assert!(!catalog.is_retired("legs").unwrap());

        catalog.delete_muscle_group(legs.id).unwrap();
        assert!(catalog.is_retired("legs").unwrap());

        let err = catalog
            .create_muscle_group(MuscleGroup::new(" legs "))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert!(catalog.muscle_group_by_identifier("legs").unwrap().is_none());
    }

    #[test]
    fn group_delete_is_one_frame() {
        let (db, _, _) = db_on(monday());
        let catalog = db.catalog().unwrap();
        let calves = catalog
            .create_muscle_group(MuscleGroup::new("calves"))
            .unwrap();
        let before = db.store().log_frames();
        catalog.delete_muscle_group(calves.id).unwrap();
        assert_eq!(db.store().log_frames(), before + 1);
    }

    #[test]
    fn renamed_exercise_is_trimmed() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let catalog = db.catalog().unwrap();

        let patch = ExercisePatch {
            name: Some(" Incline Bench ".into()),
            ..ExercisePatch::default()
        };
        let updated = catalog.update_exercise(bench, &patch).unwrap();
        assert_eq!(updated.name, "Incline Bench");
        assert_eq!(catalog.exercise(bench).unwrap().unwrap().name, "Incline Bench");
        assert_eq!(
            catalog.find_exercise_by_name("incline bench").unwrap().unwrap().id,
            bench
        );
    }

    #[test]
    fn deleting_exercise_keeps_history() {
        let (db, _, _) = db_on(monday());
        let bench = seed_chest(&db);
        let sessions = db.sessions().unwrap();
        sessions.get_or_create_today("chest").unwrap();
        sessions
            .complete_exercise(bench, vec![SetEntry::new(135.0, 5)])
            .unwrap();

        let catalog = db.catalog().unwrap();
        catalog.delete_exercise(bench).unwrap();
        assert!(catalog.exercise(bench).unwrap().is_none());
        assert_eq!(sessions.today_completions().unwrap().len(), 1);
        assert_eq!(
            db.history().unwrap().exercise_history(bench, None).unwrap().len(),
            1
        );
        assert!(matches!(
            catalog.delete_exercise(bench),
            Err(CoreError::NotFound { .. })
        ));
    }
}
