pub mod orchestrator;
pub mod progress;
pub mod report;

pub use orchestrator::SubmissionOrchestrator;
pub use progress::ProgressReporter;
pub use report::{SubmitReport, SubmitWarning};
