// Declare submodules for the jobs domain
pub mod runner;
pub mod types;

pub use runner::JobRunner;
pub use types::{JobItem, JobProgress, JobStatus, OperationRequest, ProcessedArtifact};
