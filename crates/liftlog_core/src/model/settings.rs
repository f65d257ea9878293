//! The settings singleton.

use crate::collection::Record;
use crate::error::{CoreError, CoreResult};
use crate::schema::names;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Milliseconds in a day.
const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// Unit weights are entered and shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    /// Kilograms.
    #[default]
    Kg,
    /// Pounds.
    Lb,
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kg => "kg",
            Self::Lb => "lb",
        })
    }
}

impl FromStr for WeightUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kg" | "kgs" => Ok(Self::Kg),
            "lb" | "lbs" => Ok(Self::Lb),
            other => Err(CoreError::validation(format!("unknown unit: {other}"))),
        }
    }
}

/// Display theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light.
    Light,
    /// Dark.
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        })
    }
}

impl FromStr for Theme {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(CoreError::validation(format!("unknown theme: {other}"))),
        }
    }
}

/// User preferences. At most one record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Record id; unassigned until first saved.
    #[serde(default)]
    pub id: RecordId,
    /// Weight unit.
    #[serde(default)]
    pub unit: WeightUnit,
    /// Theme.
    #[serde(default)]
    pub theme: Theme,
    /// Whether to remind about backups.
    #[serde(default = "default_true")]
    pub backup_reminder: bool,
    /// Days between reminders.
    #[serde(default = "default_frequency")]
    pub backup_frequency_days: u32,
    /// Last successful export (Unix millis).
    #[serde(default)]
    pub last_backup_at: Option<i64>,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

fn default_frequency() -> u32 {
    7
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: RecordId::default(),
            unit: WeightUnit::default(),
            theme: Theme::default(),
            backup_reminder: true,
            backup_frequency_days: default_frequency(),
            last_backup_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl Settings {
    /// Whether a backup reminder is due at `now`.
    ///
    /// Never due when reminders are off; always due when no backup was
    /// ever taken.
    #[must_use]
    pub fn backup_due(&self, now: i64) -> bool {
        if !self.backup_reminder {
            return false;
        }
        match self.last_backup_at {
            None => true,
            Some(last) => now - last >= i64::from(self.backup_frequency_days) * DAY_MILLIS,
        }
    }
}

impl Record for Settings {
    const COLLECTION: &'static str = names::SETTINGS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        if !(1..=365).contains(&self.backup_frequency_days) {
            return Err(CoreError::validation(format!(
                "backup frequency must be 1-365 days, got {}",
                self.backup_frequency_days
            )));
        }
        Ok(())
    }
}

/// Changes to settings. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsPatch {
    /// New unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<WeightUnit>,
    /// New theme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Reminder on or off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_reminder: Option<bool>,
    /// Days between reminders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_frequency_days: Option<u32>,
}

impl SettingsPatch {
    /// True when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unit.is_none()
            && self.theme.is_none()
            && self.backup_reminder.is_none()
            && self.backup_frequency_days.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_due_rules() {
        let mut settings = Settings::default();
        assert!(settings.backup_due(0));

        settings.last_backup_at = Some(0);
        assert!(!settings.backup_due(6 * DAY_MILLIS));
        assert!(settings.backup_due(7 * DAY_MILLIS));

        settings.backup_reminder = false;
        assert!(!settings.backup_due(30 * DAY_MILLIS));
    }

    #[test]
    fn parse_unit_and_theme() {
        assert_eq!("LBS".parse::<WeightUnit>().unwrap(), WeightUnit::Lb);
        assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("stone".parse::<WeightUnit>().is_err());
    }

    #[test]
    fn zero_frequency_is_invalid() {
        let settings = Settings {
            backup_frequency_days: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
