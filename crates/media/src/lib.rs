pub mod attachments;
pub mod compressor;
pub mod error;

pub use attachments::{Attachment, AttachmentSet, MAX_PHOTOS, SubmissionPlan};
pub use compressor::{CompressedImage, CompressorOptions, ImageCompressor, RawImageInput};
pub use error::MediaError;
