use thiserror::Error;

use herbarium_core::SubmitError;

/// Errors from the media pipeline.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The input bytes could not be decoded as an image.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// Re-encoding to JPEG failed.
    #[error("image encode failed: {0}")]
    Encode(String),

    /// Adding another photo would exceed the per-record cap.
    #[error("photo limit reached: at most {max} photos per record")]
    CapacityExceeded { max: usize },
}

impl From<MediaError> for SubmitError {
    fn from(err: MediaError) -> Self {
        match err {
            // Encode failures surface the same way: the file is excluded
            // and the contributor picks a different one.
            MediaError::Decode(message) | MediaError::Encode(message) => Self::Decode(message),
            MediaError::CapacityExceeded { max } => Self::CapacityExceeded { max },
        }
    }
}
