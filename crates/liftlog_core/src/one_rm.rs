//! One-rep-max estimation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A formula estimating the weight liftable for a single rep from a
/// weight moved for `reps` reps.
///
/// Every formula returns `weight` for one rep and `0` for zero reps;
/// results are rounded to the nearest whole unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Estimator {
    /// `weight × (1 + reps / 30)`.
    #[default]
    Epley,
    /// `weight × 36 / (37 − reps)`; undefined from 37 reps on, where it
    /// returns 0.
    Brzycki,
    /// `weight × (reps − 1)^0.1`, so a single rep is the weight itself.
    Lombardi,
}

impl Estimator {
    /// All estimators, for pickers and tests.
    pub const ALL: [Self; 3] = [Self::Epley, Self::Brzycki, Self::Lombardi];

    /// Estimated one-rep max.
    #[must_use]
    pub fn estimate(self, weight: f64, reps: u32) -> f64 {
        match reps {
            0 => return 0.0,
            1 => return weight,
            _ if weight <= 0.0 => return 0.0,
            _ => {}
        }
        let r = f64::from(reps);
        let raw = match self {
            Self::Epley => weight * (1.0 + r / 30.0),
            Self::Brzycki => {
                if reps >= 37 {
                    return 0.0;
                }
                weight * 36.0 / (37.0 - r)
            }
            Self::Lombardi => weight * (r - 1.0).powf(0.1),
        };
        raw.round()
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Epley => "epley",
            Self::Brzycki => "brzycki",
            Self::Lombardi => "lombardi",
        }
    }
}

/// Estimated one-rep max with the chosen formula.
#[must_use]
pub fn estimate_one_rep_max(estimator: Estimator, weight: f64, reps: u32) -> f64 {
    estimator.estimate(weight, reps)
}

/// Epley estimate.
#[must_use]
pub fn calculate_1rm(weight: f64, reps: u32) -> f64 {
    Estimator::Epley.estimate(weight, reps)
}

/// Brzycki estimate.
#[must_use]
pub fn calculate_1rm_brzycki(weight: f64, reps: u32) -> f64 {
    Estimator::Brzycki.estimate(weight, reps)
}

/// Lombardi estimate.
#[must_use]
pub fn calculate_1rm_lombardi(weight: f64, reps: u32) -> f64 {
    Estimator::Lombardi.estimate(weight, reps)
}

impl fmt::Display for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Estimator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "epley" => Ok(Self::Epley),
            "brzycki" => Ok(Self::Brzycki),
            "lombardi" => Ok(Self::Lombardi),
            other => Err(format!("unknown estimator: {other}")),
        }
    }
}
