use std::sync::Arc;

use error_stack::Report;

use crate::{
    job_core::JobCore, Aggregator, Job, JobError, JobFuture, JobKind, JobSnapshot, JobState,
    Observer,
};

/// Any of the job kinds. This is what an [Aggregator] holds, and what code that only reports on
/// jobs, such as a progress display, should take.
#[derive(Clone, Debug)]
pub enum AnyJob {
    Job(Job),
    Observer(Observer),
    Aggregator(Aggregator),
}

impl AnyJob {
    pub(crate) fn core(&self) -> &Arc<JobCore> {
        match self {
            AnyJob::Job(job) => &job.core,
            AnyJob::Observer(job) => &job.core,
            AnyJob::Aggregator(job) => &job.core,
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.core().id()
    }

    pub fn name(&self) -> &str {
        self.core().name()
    }

    pub fn kind(&self) -> JobKind {
        self.core().kind()
    }

    pub fn state(&self) -> JobState {
        self.core().state()
    }

    pub fn done_work_units(&self) -> u64 {
        self.core().done_work_units()
    }

    pub fn total_work_units(&self) -> u64 {
        self.core().total_work_units()
    }

    pub fn logs(&self) -> Vec<String> {
        self.core().logs()
    }

    pub fn log(&self, message: impl Into<String>) {
        self.core().log(message.into());
    }

    pub fn cancel_requested(&self) -> bool {
        self.core().cancel_requested()
    }

    pub fn is_cancelable(&self) -> bool {
        self.core().is_cancelable()
    }

    /// Run the job. Observers are already running, so this only returns their handle.
    pub fn run(&self) -> JobFuture {
        match self {
            AnyJob::Job(job) => job.run(),
            AnyJob::Observer(job) => job.future(),
            AnyJob::Aggregator(job) => job.run(),
        }
    }

    pub fn cancel(&self) -> JobFuture {
        match self {
            AnyJob::Job(job) => job.cancel(),
            AnyJob::Observer(job) => job.cancel(),
            AnyJob::Aggregator(job) => job.cancel(),
        }
    }

    pub fn wait(&self) -> Result<(), Report<JobError>> {
        self.core().wait()
    }

    pub fn future(&self) -> JobFuture {
        JobFuture::new(self.core().clone())
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<JobState> {
        self.core().subscribe()
    }

    pub fn as_job(&self) -> Option<&Job> {
        match self {
            AnyJob::Job(job) => Some(job),
            _ => None,
        }
    }

    pub fn as_observer(&self) -> Option<&Observer> {
        match self {
            AnyJob::Observer(job) => Some(job),
            _ => None,
        }
    }

    pub fn as_aggregator(&self) -> Option<&Aggregator> {
        match self {
            AnyJob::Aggregator(job) => Some(job),
            _ => None,
        }
    }

    /// Capture the current state of the job and, for aggregators, of all its descendants.
    pub fn snapshot(&self) -> JobSnapshot {
        let core = self.core();
        let (state, done_work_units, total_work_units) = core.progress();
        let sub_jobs = match self {
            AnyJob::Aggregator(aggregator) => aggregator
                .sub_jobs()
                .iter()
                .map(AnyJob::snapshot)
                .collect(),
            _ => Vec::new(),
        };

        JobSnapshot {
            id: core.id(),
            name: core.name().to_string(),
            kind: core.kind(),
            state,
            done_work_units,
            total_work_units,
            cancelable: core.is_cancelable(),
            logs: core.logs(),
            sub_jobs,
            taken_at: time::OffsetDateTime::now_utc(),
        }
    }
}

impl From<Job> for AnyJob {
    fn from(job: Job) -> Self {
        AnyJob::Job(job)
    }
}

impl From<&Job> for AnyJob {
    fn from(job: &Job) -> Self {
        AnyJob::Job(job.clone())
    }
}

impl From<Observer> for AnyJob {
    fn from(job: Observer) -> Self {
        AnyJob::Observer(job)
    }
}

impl From<&Observer> for AnyJob {
    fn from(job: &Observer) -> Self {
        AnyJob::Observer(job.clone())
    }
}

impl From<Aggregator> for AnyJob {
    fn from(job: Aggregator) -> Self {
        AnyJob::Aggregator(job)
    }
}

impl From<&Aggregator> for AnyJob {
    fn from(job: &Aggregator) -> Self {
        AnyJob::Aggregator(job.clone())
    }
}
