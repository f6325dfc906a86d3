use thiserror::Error;

/// Errors from object storage operations.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The requested object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// A batch removal completed with one or more failures.
    #[error("partial removal: {failed} of {total} objects could not be removed")]
    PartialRemoval {
        /// Objects that could not be removed.
        failed: usize,
        /// Objects in the batch.
        total: usize,
    },

    /// A storage backend error occurred.
    #[error("object storage error: {0}")]
    Backend(String),
}
