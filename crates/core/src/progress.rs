//! Progress surface exposed to the presentation layer.
//!
//! A commit moves through a fixed sequence of phases; the percent value is
//! monotonic within one commit and resets to idle after a terminal phase
//! plus a short display delay.

use serde::{Deserialize, Serialize};

/// The phase a submission is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    /// No commit in flight.
    Idle,
    /// Checking required fields and the final photo plan.
    ValidatingInput,
    /// Inserting the parent record row.
    CreatingRecord,
    /// Updating the parent record row.
    UpdatingRecord,
    /// Uploading one compressed image to the object store.
    UploadingMedia,
    /// Inserting the photo-reference row for an uploaded image.
    LinkingMedia,
    /// Removing blobs and photo-reference rows.
    DeletingMedia,
    /// Terminal: the commit succeeded.
    Done,
    /// Terminal: the commit failed.
    Failed,
}

impl SubmissionPhase {
    /// Whether this phase ends a commit.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Observable progress value: a 0..=100 percent plus the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionProgress {
    pub percent: u8,
    pub phase: SubmissionPhase,
}

impl SubmissionProgress {
    /// Progress at a given phase and percent.
    #[must_use]
    pub fn new(phase: SubmissionPhase, percent: u8) -> Self {
        Self { percent, phase }
    }
}

impl Default for SubmissionProgress {
    fn default() -> Self {
        Self {
            percent: 0,
            phase: SubmissionPhase::Idle,
        }
    }
}
