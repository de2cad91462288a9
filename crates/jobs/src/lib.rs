//! Cancellable, progress-reporting jobs that can be composed into weighted trees.
//!
//! - [Job] wraps a task, run either on the calling thread or on an [Executor].
//! - [Observer] reports on work that is already running somewhere else.
//! - [Aggregator] combines other jobs, weighting each one's progress.
//!
//! All three share the same lifecycle ([JobState]) and can be observed through hooks, through
//! [JobFuture]s, or by taking a [JobSnapshot].

#[macro_use]
mod macros;

mod aggregator;
mod any_job;
mod error;
mod future;
mod job;
mod job_core;
mod observer;
mod registry;
mod snapshot;
mod state;
#[cfg(test)]
mod test_util;

pub use aggregator::{Aggregator, NORMALIZED_WORK_UNITS};
pub use any_job::AnyJob;
pub use error::JobError;
pub use future::{wait_all, JobFuture};
pub use job::{Job, Task};
pub use jobweave_worker::{Executor, ExecutorError, TokioExecutor, Worker, WorkerConfig};
pub use observer::Observer;
pub use registry::{TaskFactory, TaskRegistry, TaskRegistryBuilder};
pub use snapshot::JobSnapshot;
pub use state::{JobKind, JobState};
