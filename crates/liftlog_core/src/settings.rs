//! Settings singleton access.

use crate::collection::{to_document, Collection, Record};
use crate::error::CoreResult;
use crate::model::{Settings, SettingsPatch};
use crate::store::EntityStore;
use crate::types::Document;
use serde_json::Value;

/// Reads and writes the settings record, creating it on first write.
pub struct SettingsStore<'a> {
    store: &'a EntityStore,
}

impl<'a> SettingsStore<'a> {
    /// Creates a settings view over `store`.
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    fn records(&self) -> Collection<'a, Settings> {
        Collection::new(self.store)
    }

    /// Current settings, or the defaults when none were saved.
    pub fn get(&self) -> CoreResult<Settings> {
        Ok(self.records().all()?.into_iter().next().unwrap_or_default())
    }

    /// Applies `patch` and returns the stored settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error (e.g. a zero-day backup frequency).
    pub fn update(&self, patch: &SettingsPatch) -> CoreResult<Settings> {
        let current = self.get()?;
        if !current.id().is_unassigned() {
            return self.records().update(current.id(), patch);
        }

        let mut document = current.to_document()?;
        document.extend(to_document(patch)?);
        let mut settings = Settings::from_document(current.id(), document)?;
        self.records().insert(&mut settings)?;
        Ok(settings)
    }

    /// Records a successful backup at `now` (Unix millis).
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn mark_backed_up(&self, now: i64) -> CoreResult<Settings> {
        let current = self.get()?;
        if current.id().is_unassigned() {
            let mut settings = Settings {
                last_backup_at: Some(now),
                ..current
            };
            self.records().insert(&mut settings)?;
            return Ok(settings);
        }

        let mut changes = Document::new();
        changes.insert("last_backup_at".into(), Value::from(now));
        self.records().update(current.id(), &changes)
    }

    /// Whether a backup reminder is due now.
    pub fn backup_due(&self) -> CoreResult<bool> {
        let now = self.store.clock().now_millis();
        Ok(self.get()?.backup_due(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::model::{Theme, WeightUnit};
    use crate::test_support::{db_on, monday};

    #[test]
    fn defaults_until_first_write() {
        let (db, _, _) = db_on(monday());
        let settings = db.settings().unwrap();
        let current = settings.get().unwrap();
        assert!(current.id().is_unassigned());
        assert_eq!(current.unit, WeightUnit::Kg);
        assert!(settings.backup_due().unwrap());
        assert_eq!(db.store().count(Settings::COLLECTION).unwrap(), 0);
    }

    #[test]
    fn update_creates_then_patches_one_record() {
        let (db, _, _) = db_on(monday());
        let settings = db.settings().unwrap();

        let first = settings
            .update(&SettingsPatch {
                theme: Some(Theme::Dark),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert!(!first.id().is_unassigned());
        assert_eq!(first.theme, Theme::Dark);

        let second = settings
            .update(&SettingsPatch {
                unit: Some(WeightUnit::Lb),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(second.id(), first.id());
        assert_eq!(second.theme, Theme::Dark);
        assert_eq!(second.unit, WeightUnit::Lb);
        assert_eq!(db.store().count(Settings::COLLECTION).unwrap(), 1);
    }

    #[test]
    fn invalid_frequency_is_rejected() {
        let (db, _, _) = db_on(monday());
        let err = db
            .settings()
            .unwrap()
            .update(&SettingsPatch {
                backup_frequency_days: Some(0),
                ..SettingsPatch::default()
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(db.store().count(Settings::COLLECTION).unwrap(), 0);
    }

    #[test]
    fn marking_a_backup_silences_the_reminder() {
        let (db, clock, _) = db_on(monday());
        let settings = db.settings().unwrap();
        let now = db.store().clock().now_millis();
        settings.mark_backed_up(now).unwrap();
        assert!(!settings.backup_due().unwrap());

        clock.set_day(monday().checked_add_days(chrono::Days::new(8)).unwrap());
        assert!(settings.backup_due().unwrap());
    }
}
