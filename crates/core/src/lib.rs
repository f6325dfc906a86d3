pub mod error;
pub mod progress;
pub mod record;
pub mod types;

pub use error::SubmitError;
pub use progress::{SubmissionPhase, SubmissionProgress};
pub use record::{AggregateRecord, PhotoRef, RecordFields};
pub use types::{OwnerId, PhotoId, RecordId};
