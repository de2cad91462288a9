use std::{panic::AssertUnwindSafe, sync::Arc};

use jobweave_worker::Executor;
use parking_lot::Mutex;
use tracing::{event, instrument, Level};

use crate::{job_core::JobCore, JobError, JobFuture, JobKind, JobState};

/// The body of a [Job]. It receives the job so it can report progress and check for cancellation.
pub type Task = Box<dyn FnOnce(&Job) + Send + 'static>;

/// A cancellable unit of work wrapping a task.
///
/// Cloning a `Job` gives another handle to the same job.
#[derive(Clone)]
pub struct Job {
    pub(crate) core: Arc<JobCore>,
    task: Arc<Mutex<Option<Task>>>,
    executor: Option<Arc<dyn Executor>>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("core", &self.core)
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}

impl Job {
    /// Create a job whose task runs on the thread that calls [Job::run].
    pub fn new(name: impl Into<String>, task: impl FnOnce(&Job) + Send + 'static) -> Job {
        Self::build(name.into(), Box::new(task), None)
    }

    /// Create a job whose task is submitted to `executor` when the job is run.
    pub fn with_executor(
        name: impl Into<String>,
        task: impl FnOnce(&Job) + Send + 'static,
        executor: impl Executor + 'static,
    ) -> Job {
        Self::build(name.into(), Box::new(task), Some(Arc::new(executor)))
    }

    fn build(name: String, task: Task, executor: Option<Arc<dyn Executor>>) -> Job {
        Job {
            core: Arc::new(JobCore::new(name, JobKind::Job, JobState::Waiting, 0)),
            task: Arc::new(Mutex::new(Some(task))),
            executor,
        }
    }

    common_job_methods!();
    progress_methods!();

    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    /// Start the job. Without an executor the task runs before this returns; with one, the task is
    /// queued and this returns right away. Only the first call on a Waiting job does anything.
    #[instrument(level = "debug", skip(self), fields(job = %self.name()))]
    pub fn run(&self) -> JobFuture {
        let Some(started) = self.core.start() else {
            return self.future();
        };
        started.run();

        let task = self.task.lock().take();
        match &self.executor {
            None => self.execute(task),
            Some(executor) => {
                let queued = QueuedTask {
                    job: Some(self.clone()),
                    task,
                };
                if let Err(e) = executor.submit(Box::new(move || queued.run())) {
                    let e = e
                        .change_context(JobError::ExecutorUnavailable)
                        .attach_printable(format!("Job {}", self.name()));
                    event!(Level::ERROR, job = %self.name(), error = ?e, "failed to submit job");
                    self.core.log(format!("Failed to submit job: {e:?}"));
                    if let Some(canceled) = self.core.request_cancel(false) {
                        canceled.run();
                    }
                    self.core.finish().run();
                }
            }
        }

        self.future()
    }

    /// Ask the job to stop. A Waiting job is canceled immediately and its task never runs. A
    /// Running job becomes Canceling, and becomes Canceled once its task returns.
    #[instrument(level = "debug", skip(self), fields(job = %self.name()))]
    pub fn cancel(&self) -> JobFuture {
        if let Some(canceled) = self.core.request_cancel(false) {
            canceled.run();
        }
        self.future()
    }

    fn execute(&self, task: Option<Task>) {
        if let Some(task) = task {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| task(self))) {
                let message = panic_message(panic.as_ref());
                event!(Level::ERROR, job = %self.name(), %message, "job task panicked");
                self.core.log(format!("Task panicked: {message}"));
                // A panicked task ends Canceled.
                if let Some(canceled) = self.core.request_cancel(false) {
                    canceled.run();
                }
            }
        }

        self.core.finish().run();
    }
}

/// A task waiting in an executor queue. If the executor drops it without running it, the job is
/// canceled instead of staying Running forever.
struct QueuedTask {
    job: Option<Job>,
    task: Option<Task>,
}

impl QueuedTask {
    fn run(mut self) {
        if let Some(job) = self.job.take() {
            job.execute(self.task.take());
        }
    }
}

impl Drop for QueuedTask {
    fn drop(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };

        event!(Level::ERROR, job = %job.name(), "task dropped by executor");
        job.core.log("Task dropped by executor before it ran".to_string());
        if let Some(canceled) = job.core.request_cancel(false) {
            canceled.run();
        }
        job.core.finish().run();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
