//! Composite jobs whose progress is the weighted sum of their sub-jobs.
//!
//! Each sub-job is rescaled so that it counts for [NORMALIZED_WORK_UNITS] times its weight,
//! whatever unit it counts its own work in. The aggregator keeps running sums of every
//! sub-job's contribution and adjusts them by the difference whenever a sub-job reports a
//! change, so reading the counters never walks the sub-jobs.

use std::sync::{Arc, Weak};

use ahash::HashMap;
use parking_lot::Mutex;
use tracing::{event, instrument, Level};
use uuid::Uuid;

use crate::{
    job_core::{Deferred, JobCore},
    AnyJob, JobFuture, JobKind, JobState,
};

/// The number of work units a sub-job of weight 1 counts for in its aggregator.
pub const NORMALIZED_WORK_UNITS: f64 = 100.0;

/// The fraction of a sub-job's work that is done.
fn progress_ratio(state: JobState, done: u64, total: u64) -> f64 {
    if state == JobState::Finished {
        1.0
    } else if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64).min(1.0)
    }
}

struct SubJob {
    job: AnyJob,
    weight: f64,
    /// Whether the sub-job counts toward the aggregator total. It stops counting only when its
    /// total goes from a known value back to unknown.
    counted: bool,
    last_total: u64,
    ratio: f64,
    terminal: bool,
}

impl SubJob {
    fn total_contribution(&self) -> f64 {
        if self.counted {
            NORMALIZED_WORK_UNITS * self.weight
        } else {
            0.0
        }
    }

    fn done_contribution(&self) -> f64 {
        self.total_contribution() * self.ratio
    }
}

#[derive(Default)]
struct Children {
    entries: Vec<SubJob>,
    index: HashMap<Uuid, usize>,
    total: f64,
    done: f64,
    /// Sub-jobs that have not reached a terminal state.
    remaining: usize,
    canceled: usize,
}

impl Children {
    /// Re-read a sub-job and apply the difference to the running sums. Returns true if the
    /// sub-job has just become terminal.
    fn refresh(&mut self, index: usize) -> bool {
        let sub = &mut self.entries[index];
        let (state, done, total) = sub.job.core().progress();

        self.total -= sub.total_contribution();
        self.done -= sub.done_contribution();

        if total != 0 {
            sub.counted = true;
        } else if sub.last_total != 0 {
            sub.counted = false;
        }
        sub.last_total = total;
        sub.ratio = progress_ratio(state, done, total);

        self.total += sub.total_contribution();
        self.done += sub.done_contribution();

        if !state.is_terminal() || sub.terminal {
            return false;
        }

        sub.terminal = true;
        self.remaining -= 1;
        if state == JobState::Canceled {
            self.canceled += 1;
        }
        true
    }

    /// The aggregator counters, as (total, done).
    fn work_units(&self) -> (u64, u64) {
        let total = self.total.round().max(0.0) as u64;
        let done = (self.done.round().max(0.0) as u64).min(total);
        (total, done)
    }
}

/// A job made of other jobs. Running it runs its sub-jobs in the order they were added, and it
/// finishes once they all have.
#[derive(Clone)]
pub struct Aggregator {
    pub(crate) core: Arc<JobCore>,
    children: Arc<Mutex<Children>>,
}

/// A reference to an aggregator held by its sub-jobs' hooks, so that sub-jobs do not keep their
/// aggregator alive.
#[derive(Clone)]
struct WeakAggregator {
    core: Weak<JobCore>,
    children: Weak<Mutex<Children>>,
}

impl WeakAggregator {
    fn upgrade(&self) -> Option<Aggregator> {
        Some(Aggregator {
            core: self.core.upgrade()?,
            children: self.children.upgrade()?,
        })
    }
}

impl Aggregator {
    pub fn new(name: impl Into<String>) -> Aggregator {
        Aggregator {
            core: Arc::new(JobCore::new(
                name.into(),
                JobKind::Aggregator,
                JobState::Waiting,
                0,
            )),
            children: Arc::new(Mutex::new(Children::default())),
        }
    }

    common_job_methods!();

    fn downgrade(&self) -> WeakAggregator {
        WeakAggregator {
            core: Arc::downgrade(&self.core),
            children: Arc::downgrade(&self.children),
        }
    }

    /// Add a sub-job with a weight of 1. See [Aggregator::add_weighted].
    pub fn add(&self, job: impl Into<AnyJob>) -> bool {
        self.add_weighted(job, 1.0)
    }

    /// Add a sub-job that counts for `weight` times [NORMALIZED_WORK_UNITS].
    ///
    /// Returns false, leaving the aggregator unchanged, if the job was already added, if the
    /// aggregator is Finished or Canceled, or if the weight is not a positive number. A sub-job
    /// added while the aggregator is running is started right away.
    pub fn add_weighted(&self, job: impl Into<AnyJob>, weight: f64) -> bool {
        self.add_sub_job(job.into(), weight)
    }

    #[instrument(level = "debug", skip(self, job), fields(job = %self.name(), sub_job = %job.name()))]
    fn add_sub_job(&self, job: AnyJob, weight: f64) -> bool {
        if !weight.is_finite() || weight <= 0.0 {
            event!(Level::WARN, %weight, "Ignoring sub-job with invalid weight");
            return false;
        }

        let id = job.id();
        if id == self.id() {
            event!(Level::WARN, "Ignoring attempt to add an aggregator to itself");
            return false;
        }

        let state;
        let backlog;
        let deferred;
        {
            let mut children = self.children.lock();
            state = self.core.state();
            if state.is_terminal() || children.index.contains_key(&id) {
                return false;
            }

            let index = children.entries.len();
            children.entries.push(SubJob {
                job: job.clone(),
                weight,
                counted: true,
                last_total: 0,
                ratio: 0.0,
                terminal: false,
            });
            children.index.insert(id, index);
            children.remaining += 1;
            children.total += NORMALIZED_WORK_UNITS * weight;

            let parent = self.downgrade();
            let changed: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
                if let Some(parent) = parent.upgrade() {
                    parent.sub_job_changed(id);
                }
            });

            let core = job.core();
            let on_change = changed.clone();
            core.add_done_work_hook(Arc::new(move |_, _| on_change()));
            let on_change = changed.clone();
            core.add_total_work_units_hook(Arc::new(move |_, _| on_change()));
            core.add_state_hook(Arc::new(move |_| changed()));

            let parent_core = Arc::downgrade(&self.core);
            backlog = core.add_log_hook(Arc::new(move |message: &str| {
                if let Some(parent_core) = parent_core.upgrade() {
                    parent_core.log(message.to_string());
                }
            }));

            children.refresh(index);
            let (total, done) = children.work_units();
            deferred = self.core.set_work_units(total, done);
        }

        event!(Level::DEBUG, %weight, "Added sub-job");
        deferred.run();
        self.core.log_many(backlog);

        match state {
            JobState::Running => {
                job.run();
            }
            JobState::Canceling => {
                job.cancel();
            }
            _ => {}
        }

        self.reconcile();
        true
    }

    fn sub_job_changed(&self, id: Uuid) {
        let became_terminal;
        let deferred;
        {
            let mut children = self.children.lock();
            let Some(&index) = children.index.get(&id) else {
                return;
            };

            became_terminal = children.refresh(index);
            let (total, done) = children.work_units();
            deferred = self.core.set_work_units(total, done);
        }

        deferred.run();
        if became_terminal {
            self.reconcile();
        }
    }

    /// Bring the aggregator state in line with its sub-jobs: a canceled sub-job cancels a running
    /// aggregator, and the aggregator completes once no sub-job is left running.
    fn reconcile(&self) {
        let mut deferred = Deferred::default();
        let mut cancel_sub_jobs = false;
        {
            let children = self.children.lock();
            if children.canceled > 0 && self.core.state() == JobState::Running {
                if let Some(canceled) = self.core.request_cancel(false) {
                    event!(Level::DEBUG, job = %self.name(), "Sub-job canceled, canceling aggregator");
                    deferred.merge(canceled);
                    cancel_sub_jobs = true;
                }
            }

            if children.remaining == 0 {
                deferred.merge(self.core.finish());
            }
        }

        deferred.run();
        if cancel_sub_jobs {
            self.cancel_sub_jobs();
        }
    }

    fn cancel_sub_jobs(&self) {
        for job in self.sub_jobs() {
            job.cancel();
        }
    }

    /// Start the aggregator and run each sub-job in the order they were added. Sub-jobs without
    /// an executor run to completion on this thread before the next one starts. Does nothing if
    /// the aggregator was already started.
    #[instrument(level = "debug", skip(self), fields(job = %self.name()))]
    pub fn run(&self) -> JobFuture {
        let started = {
            let _children = self.children.lock();
            self.core.start()
        };

        if let Some(started) = started {
            started.run();
            for job in self.sub_jobs() {
                job.run();
            }
            self.reconcile();
        }

        self.future()
    }

    /// Request cancellation of the aggregator and of every sub-job that has not completed yet.
    ///
    /// A Waiting aggregator becomes Canceled right away, like any Waiting job. If one of its
    /// sub-jobs was started on its own and is still Canceling, the aggregator does not wait for
    /// it; wait on that sub-job directly when its completion matters.
    #[instrument(level = "debug", skip(self), fields(job = %self.name()))]
    pub fn cancel(&self) -> JobFuture {
        let requested = {
            let _children = self.children.lock();
            self.core.request_cancel(false)
        };

        if let Some(requested) = requested {
            requested.run();
            self.cancel_sub_jobs();
            self.reconcile();
        }

        self.future()
    }

    /// The distinct sub-jobs, in the order they were added.
    pub fn sub_jobs(&self) -> Vec<AnyJob> {
        self.children
            .lock()
            .entries
            .iter()
            .map(|sub| sub.job.clone())
            .collect()
    }

    /// The weight a sub-job was added with.
    pub fn weight_of(&self, id: Uuid) -> Option<f64> {
        let children = self.children.lock();
        children
            .index
            .get(&id)
            .map(|&index| children.entries[index].weight)
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("core", &self.core)
            .field("sub_jobs", &self.children.lock().entries.len())
            .finish()
    }
}
