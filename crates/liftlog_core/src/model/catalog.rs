//! Exercise catalog records.

use super::settings::WeightUnit;
use crate::collection::Record;
use crate::error::{CoreError, CoreResult};
use crate::schema::names;
use crate::types::RecordId;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A muscle group exercises are filed under.
///
/// `identifier` is the stable key that exercises and sessions reference;
/// it cannot change once created and is never reused, even after the group
/// is deleted (see [`RetiredIdentifier`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleGroup {
    /// Record id.
    #[serde(default)]
    pub id: RecordId,
    /// Stable key, e.g. `"Chest"`.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Color tag.
    #[serde(default)]
    pub color: String,
    /// Icon glyph.
    #[serde(default)]
    pub icon: String,
    /// Inactive groups are hidden from pickers.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Position in pickers, ascending.
    #[serde(default)]
    pub sort_order: i64,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

impl MuscleGroup {
    /// A new active group whose display name is its identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            id: RecordId::default(),
            name: identifier.clone(),
            identifier,
            color: String::new(),
            icon: String::new(),
            is_active: true,
            sort_order: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the color tag.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Sets the icon glyph.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Sets the sort order.
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }
}

impl Record for MuscleGroup {
    const COLLECTION: &'static str = names::MUSCLE_GROUPS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(CoreError::validation("muscle group identifier is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("muscle group name is empty"));
        }
        Ok(())
    }
}

/// Changes to a muscle group. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MuscleGroupPatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New color tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// New icon glyph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Show or hide the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// New position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

/// Identifier of a deleted muscle group, kept so it is never handed to a
/// new group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetiredIdentifier {
    /// Record id.
    #[serde(default)]
    pub id: RecordId,
    /// The identifier the deleted group had.
    pub identifier: String,
    /// When the group was deleted (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

impl RetiredIdentifier {
    /// Retires `identifier`.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            id: RecordId::default(),
            identifier: identifier.into(),
            created_at: 0,
            updated_at: 0,
        }
    }
}

impl Record for RetiredIdentifier {
    const COLLECTION: &'static str = names::RETIRED_IDENTIFIERS;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(CoreError::validation("retired identifier is empty"));
        }
        Ok(())
    }
}

/// A catalog exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Record id.
    #[serde(default)]
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Identifier of the owning [`MuscleGroup`].
    pub muscle_group: String,
    /// Other names the exercise is known by.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Unit to show for this exercise instead of the global setting.
    #[serde(default)]
    pub preferred_unit: Option<WeightUnit>,
    /// Link to a demonstration.
    #[serde(default)]
    pub demo_url: Option<String>,
    /// Creation time (Unix millis).
    #[serde(default)]
    pub created_at: i64,
    /// Last update (Unix millis).
    #[serde(default)]
    pub updated_at: i64,
}

impl Exercise {
    /// A new exercise in `muscle_group`.
    pub fn new(name: impl Into<String>, muscle_group: impl Into<String>) -> Self {
        Self {
            id: RecordId::default(),
            name: name.into(),
            muscle_group: muscle_group.into(),
            aliases: Vec::new(),
            preferred_unit: None,
            demo_url: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Adds an alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Sets the preferred unit.
    #[must_use]
    pub fn with_unit(mut self, unit: WeightUnit) -> Self {
        self.preferred_unit = Some(unit);
        self
    }

    /// Sets the demonstration link.
    #[must_use]
    pub fn with_demo_url(mut self, url: impl Into<String>) -> Self {
        self.demo_url = Some(url.into());
        self
    }

    /// Case-insensitive match on the name or any alias.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

impl Record for Exercise {
    const COLLECTION: &'static str = names::EXERCISES;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::validation("exercise name is empty"));
        }
        if self.muscle_group.trim().is_empty() {
            return Err(CoreError::validation("exercise has no muscle group"));
        }
        if self.aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(CoreError::validation("exercise alias is empty"));
        }
        Ok(())
    }
}

/// Changes to an exercise. The muscle group is fixed at creation.
///
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExercisePatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement alias list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<Vec<String>>,
    /// Set or clear the preferred unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_unit: Option<Option<WeightUnit>>,
    /// Set or clear the demonstration link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_url: Option<Option<String>>,
}
