//! Sessions, completions and the set ledger.

use crate::collection::Record;
use crate::error::{CoreError, CoreResult};
use crate::schema::names;
use crate::types::RecordId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Heaviest weight accepted for a set.
pub const MAX_WEIGHT: f64 = 9999.0;

/// Most reps accepted for a set.
pub const MAX_REPS: u32 = 999;

/// Lifecycle of a day's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Open for completions.
    InProgress,
    /// Finished; terminal for that date.
    Completed,
}

impl SessionStatus {
    /// Stored form, as matched by the `status` index.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single workout container for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutSession {
    /// Record id.
    #[serde(default)]
    pub id: RecordId,
    /// Calendar day, stored as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Identifier of the day's muscle group.
    pub muscle_group: String,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

impl WorkoutSession {
    /// A fresh in-progress session.
    pub fn new(date: NaiveDate, muscle_group: impl Into<String>) -> Self {
        Self {
            id: RecordId::default(),
            date,
            muscle_group: muscle_group.into(),
            status: SessionStatus::InProgress,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// True once the session was finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

impl Record for WorkoutSession {
    const COLLECTION: &'static str = names::WORKOUT_SESSIONS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        if self.muscle_group.trim().is_empty() {
            return Err(CoreError::validation("session has no muscle group"));
        }
        Ok(())
    }
}

/// One performed set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    /// Weight moved, in the user's unit.
    pub weight: f64,
    /// Repetitions.
    pub reps: u32,
    /// Rate of perceived exertion, 1-10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpe: Option<u8>,
}

impl SetEntry {
    /// A set without an effort rating.
    #[must_use]
    pub fn new(weight: f64, reps: u32) -> Self {
        Self {
            weight,
            reps,
            rpe: None,
        }
    }

    /// Adds an effort rating.
    #[must_use]
    pub fn with_rpe(mut self, rpe: u8) -> Self {
        self.rpe = Some(rpe);
        self
    }

    /// `weight × reps`.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }

    /// Checks the recording bounds: `0 < weight ≤ 9999`, `0 < reps ≤ 999`,
    /// effort in `1..=10`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the offending value.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.weight.is_finite() || self.weight <= 0.0 || self.weight > MAX_WEIGHT {
            return Err(CoreError::validation(format!(
                "weight must be in (0, {MAX_WEIGHT}], got {}",
                self.weight
            )));
        }
        if self.reps == 0 || self.reps > MAX_REPS {
            return Err(CoreError::validation(format!(
                "reps must be in 1..={MAX_REPS}, got {}",
                self.reps
            )));
        }
        if let Some(rpe) = self.rpe {
            if !(1..=10).contains(&rpe) {
                return Err(CoreError::validation(format!(
                    "effort rating must be 1-10, got {rpe}"
                )));
            }
        }
        Ok(())
    }
}

/// Checks a set list for a completion.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] for an empty list or any bad set.
pub fn validate_sets(sets: &[SetEntry]) -> CoreResult<()> {
    if sets.is_empty() {
        return Err(CoreError::validation("at least one set is required"));
    }
    for (i, set) in sets.iter().enumerate() {
        set.validate().map_err(|e| match e {
            CoreError::Validation { message } => {
                CoreError::validation(format!("set {}: {message}", i + 1))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// An exercise's sets within one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseCompletion {
    /// Record id.
    #[serde(default)]
    pub id: RecordId,
    /// Owning session.
    pub session_id: RecordId,
    /// Exercise performed.
    pub exercise_id: RecordId,
    /// Sets in the order performed.
    pub sets: Vec<SetEntry>,
    /// When the exercise was completed (Unix millis).
    pub completed_at: i64,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

impl ExerciseCompletion {
    /// Sum of set volumes.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.sets.iter().map(SetEntry::volume).sum()
    }
}

impl Record for ExerciseCompletion {
    const COLLECTION: &'static str = names::EXERCISE_COMPLETIONS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        validate_sets(&self.sets)
    }
}

/// One set in the flat per-exercise history.
///
/// Written alongside each completion; survives deletion of the session it
/// came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Record id.
    #[serde(default)]
    pub id: RecordId,
    /// Exercise performed.
    pub exercise_id: RecordId,
    /// Session the set was logged in, if any.
    #[serde(default)]
    pub session_id: Option<RecordId>,
    /// Weight moved.
    pub weight: f64,
    /// Repetitions.
    pub reps: u32,
    /// Effort rating.
    #[serde(default)]
    pub rpe: Option<u8>,
    /// When the set was recorded (Unix millis).
    pub recorded_at: i64,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

impl LedgerEntry {
    /// Ledger copy of `set`.
    #[must_use]
    pub fn from_set(
        exercise_id: RecordId,
        session_id: Option<RecordId>,
        set: &SetEntry,
        recorded_at: i64,
    ) -> Self {
        Self {
            id: RecordId::default(),
            exercise_id,
            session_id,
            weight: set.weight,
            reps: set.reps,
            rpe: set.rpe,
            recorded_at,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// The set this entry records.
    #[must_use]
    pub fn set(&self) -> SetEntry {
        SetEntry {
            weight: self.weight,
            reps: self.reps,
            rpe: self.rpe,
        }
    }
}

impl Record for LedgerEntry {
    const COLLECTION: &'static str = names::SET_ENTRIES;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        self.set().validate()
    }
}
