//! Domain records.

mod catalog;
mod settings;
mod workout;

pub use catalog::{Exercise, ExercisePatch, MuscleGroup, MuscleGroupPatch, RetiredIdentifier};
pub use settings::{Settings, SettingsPatch, Theme, WeightUnit};
pub use workout::{
    validate_sets, ExerciseCompletion, LedgerEntry, SessionStatus, SetEntry, WorkoutSession,
    MAX_REPS, MAX_WEIGHT,
};
