use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SubmitError;
use crate::types::{OwnerId, PhotoId, RecordId};

/// The scalar text fields a contributor fills in for one botanical record.
///
/// Every field is required at create time; [`RecordFields::validate`]
/// rejects empty or whitespace-only values before any storage work starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    /// Name in the contributor's local language.
    pub local_name: String,
    /// Common English name.
    pub english_name: String,
    /// Botanical (family) name.
    pub botanical_name: String,
    /// Scientific (binomial) name.
    pub scientific_name: String,
    /// Free-text description of the plant's appearance.
    pub description: String,
    /// Regions or habitats where the plant is found.
    pub location: String,
    /// Ailments the plant is traditionally used for.
    pub ailments: String,
    /// Source the contributor drew the information from.
    pub reference: String,
}

impl RecordFields {
    /// Check that every field carries a non-empty value.
    pub fn validate(&self) -> Result<(), SubmitError> {
        let fields = [
            ("local_name", &self.local_name),
            ("english_name", &self.english_name),
            ("botanical_name", &self.botanical_name),
            ("scientific_name", &self.scientific_name),
            ("description", &self.description),
            ("location", &self.location),
            ("ailments", &self.ailments),
            ("reference", &self.reference),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(SubmitError::Validation(format!(
                    "required field `{name}` is empty"
                )));
            }
        }
        Ok(())
    }
}

/// One stored record row together with its identity and ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Identifier minted by the record store; immutable once assigned.
    pub id: RecordId,
    /// The contributor that owns this record.
    pub owner: OwnerId,
    /// The scalar text fields.
    pub fields: RecordFields,
    /// When the record was first inserted.
    pub created_at: DateTime<Utc>,
}

/// One stored photo-reference row linking a record to a public media URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
    pub id: PhotoId,
    pub url: String,
}
