use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job was never started, so waiting on it could block forever.
    #[error("Job has not been started")]
    StillWaiting,
    #[error("Job state channel closed")]
    StateChannelClosed,
    #[error("Failed to submit job to its executor")]
    ExecutorUnavailable,
}
