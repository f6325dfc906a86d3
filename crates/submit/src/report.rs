use serde::{Deserialize, Serialize};

use herbarium_core::{PhotoId, RecordId};

/// Outcome of a commit that reached a terminal success state.
///
/// Warnings carry the deliberately-non-fatal failures of deletion paths;
/// a commit can succeed for the record and its links while still failing
/// to reclaim storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReport {
    /// The record the commit created, updated, or deleted.
    pub record_id: RecordId,
    /// Non-fatal failures encountered along the way.
    pub warnings: Vec<SubmitWarning>,
}

impl SubmitReport {
    /// A report with no warnings.
    #[must_use]
    pub fn clean(record_id: RecordId) -> Self {
        Self {
            record_id,
            warnings: Vec::new(),
        }
    }

    /// Whether the commit completed without warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A non-fatal failure surfaced separately from the commit result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitWarning {
    /// Blobs could not be removed; any affected photo rows were still
    /// deleted. The dangling blobs are invisible to users.
    BlobRemoval { keys: Vec<String>, message: String },
    /// Photo-reference rows could not be deleted.
    PhotoRowRemoval { ids: Vec<PhotoId>, message: String },
}
