use thiserror::Error;

/// Errors from record store operations.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// The referenced row does not exist.
    #[error("row not found: {0}")]
    NotFound(String),

    /// A storage backend error occurred.
    #[error("record store error: {0}")]
    Backend(String),
}
