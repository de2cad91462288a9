//! Execution contexts for jobweave jobs.
//!
//! A job that is bound to an [Executor] hands its task body to it when the job is run, instead of
//! running it on the calling thread. The only thing the job engine needs from an execution context
//! is "take this closure and run it somewhere".

use std::sync::Arc;

use error_stack::Report;
use thiserror::Error;

mod config;
pub mod stats;
#[cfg(feature = "tokio")]
mod tokio_executor;
mod worker;

pub use config::WorkerConfig;
#[cfg(feature = "tokio")]
pub use tokio_executor::TokioExecutor;
pub use worker::Worker;

/// A unit of work submitted to an [Executor].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor was shut down")]
    ShutDown,
    #[error("Failed to start the worker thread")]
    ThreadSpawn,
    #[error("No tokio runtime is running")]
    NoRuntime,
}

/// Something that can run tasks, usually on another thread.
pub trait Executor: Send + Sync {
    /// Queue a task for execution. This returns once the task is queued, not once it has run.
    fn submit(&self, task: Task) -> Result<(), Report<ExecutorError>>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn submit(&self, task: Task) -> Result<(), Report<ExecutorError>> {
        (**self).submit(task)
    }
}
