//! Property-based test generators using proptest.
//!
//! Provides strategies for generating sets within the recording bounds
//! and random sequences of session operations.

use liftlog_core::{Estimator, SetEntry, MAX_REPS, MAX_WEIGHT};
use proptest::prelude::*;

/// Case count for properties that open a database per case.
pub const DATABASE_CASES: u32 = 48;

/// Proptest settings for properties that open a database per case.
#[must_use]
pub fn database_config() -> ProptestConfig {
    ProptestConfig {
        cases: DATABASE_CASES,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    }
}

/// Strategy for weights in quarter-unit steps within `(0, MAX_WEIGHT]`.
pub fn weight_strategy() -> impl Strategy<Value = f64> {
    let max_quarters = (MAX_WEIGHT * 4.0) as u32;
    (1..=max_quarters).prop_map(|q| f64::from(q) * 0.25)
}

/// Strategy for sets that pass validation.
pub fn set_entry_strategy() -> impl Strategy<Value = SetEntry> {
    (weight_strategy(), 1..=MAX_REPS, prop::option::of(1u8..=10)).prop_map(
        |(weight, reps, rpe)| SetEntry {
            weight,
            reps,
            rpe,
        },
    )
}

/// Strategy for a non-empty list of valid sets.
pub fn sets_strategy() -> impl Strategy<Value = Vec<SetEntry>> {
    prop::collection::vec(set_entry_strategy(), 1..6)
}

/// Strategy for sets that break at least one bound.
pub fn invalid_set_strategy() -> impl Strategy<Value = SetEntry> {
    prop_oneof![
        (1..=MAX_REPS).prop_map(|reps| SetEntry::new(0.0, reps)),
        (1..=MAX_REPS).prop_map(|reps| SetEntry::new(-5.0, reps)),
        weight_strategy().prop_map(|w| SetEntry::new(w, 0)),
        weight_strategy().prop_map(|w| SetEntry::new(w, MAX_REPS + 1)),
        (11u8..=u8::MAX).prop_map(|rpe| SetEntry::new(100.0, 5).with_rpe(rpe)),
        Just(SetEntry::new(100.0, 5).with_rpe(0)),
        Just(SetEntry::new(MAX_WEIGHT + 0.5, 5)),
    ]
}

/// Strategy for an estimator.
pub fn estimator_strategy() -> impl Strategy<Value = Estimator> {
    prop::sample::select(Estimator::ALL.to_vec())
}

/// Strategy for muscle group identifiers.
pub fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z_]{0,15}").expect("Invalid regex")
}

/// One step a user can take against the session lifecycle.
///
/// Indexes pick from whatever groups and exercises a test has set up,
/// modulo their count.
#[derive(Debug, Clone)]
pub enum SessionOp {
    /// Select a muscle group for today.
    Select(usize),
    /// Log sets for an exercise.
    Complete(usize, Vec<SetEntry>),
    /// Finish today's session.
    Finish,
    /// Move to the next day.
    NextDay,
}

/// Strategy for one [`SessionOp`], weighted towards selecting and logging.
pub fn session_op_strategy() -> impl Strategy<Value = SessionOp> {
    prop_oneof![
        3 => (0usize..8).prop_map(SessionOp::Select),
        4 => (0usize..8, sets_strategy()).prop_map(|(i, sets)| SessionOp::Complete(i, sets)),
        1 => Just(SessionOp::Finish),
        2 => Just(SessionOp::NextDay),
    ]
}

/// Strategy for a sequence of session operations.
pub fn session_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<SessionOp>> {
    prop::collection::vec(session_op_strategy(), 0..max_len)
}
