use thiserror::Error;

/// Top-level error type surfaced by the submission pipeline.
///
/// Validation, decode, and capacity errors are recoverable: nothing has
/// been written when they occur. Storage and record-store errors are
/// phase-dependent; during uploads they fail the whole commit, during
/// deletion paths the orchestrator downgrades them to warnings.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// A required field is missing or the plan contains no photos.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An image could not be read; the affected file is excluded.
    #[error("unreadable image: {0}")]
    Decode(String),

    /// The per-record photo limit was reached.
    #[error("photo limit reached: at most {max} photos per record")]
    CapacityExceeded { max: usize },

    /// A blob put or remove failed.
    #[error("object storage error: {0}")]
    Storage(String),

    /// A record or photo-reference row write failed.
    #[error("record store error: {0}")]
    RecordStore(String),

    /// Another commit for this orchestrator is still in flight.
    #[error("a submission is already in progress")]
    CommitInFlight,
}
