//! Mapping between typed records and stored documents.

use crate::error::{CoreError, CoreResult};
use crate::types::{Document, RecordId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Field carrying the id when a record is serialized on its own.
pub const ID_FIELD: &str = "id";

/// A type stored in one collection.
///
/// The id lives outside the stored document; `to_document` strips it and
/// `from_document` puts it back. Timestamps are store-managed and are
/// overwritten on insert and update.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Note {
///     #[serde(default)]
///     id: RecordId,
///     text: String,
/// }
///
/// impl Record for Note {
///     const COLLECTION: &'static str = "notes";
///     fn id(&self) -> RecordId { self.id }
///     fn set_id(&mut self, id: RecordId) { self.id = id; }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Collection holding records of this type.
    const COLLECTION: &'static str;

    /// Stored id, unassigned before the first insert.
    fn id(&self) -> RecordId;

    /// Sets the id after insert.
    fn set_id(&mut self, id: RecordId);

    /// Checks field rules before a write.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] describing the broken rule.
    fn validate(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Converts into a storable document.
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the type does not serialize to an
    /// object.
    fn to_document(&self) -> CoreResult<Document> {
        let mut document = to_document(self)?;
        document.remove(ID_FIELD);
        Ok(document)
    }

    /// Rebuilds a record from its stored document.
    ///
    /// # Errors
    ///
    /// Returns an encoding error if the document does not match the type.
    fn from_document(id: RecordId, mut document: Document) -> CoreResult<Self> {
        document.insert(ID_FIELD.to_string(), Value::from(id.as_u64()));
        serde_json::from_value(Value::Object(document)).map_err(|e| {
            CoreError::encoding(format!("{} record {id}: {e}", Self::COLLECTION))
        })
    }
}

/// Serializes any value that maps to a JSON object (records, patches).
///
/// # Errors
///
/// Returns an encoding error for values that are not objects.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> CoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::encoding(format!(
            "expected an object, got {other}"
        ))),
    }
}
