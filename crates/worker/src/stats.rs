use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters describing what a worker has done so far.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Tasks accepted into the queue.
    pub submitted: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
    /// Tasks that panicked. The worker keeps running after a panic.
    pub panicked: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatisticsTracker {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl StatisticsTracker {
    /// Count a task before it is queued, so that it can never show up as finished first.
    pub fn task_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Release);
    }

    /// Undo [StatisticsTracker::task_submitted] for a task that could not be queued.
    pub fn task_rejected(&self) {
        self.submitted.fetch_sub(1, Ordering::Release);
    }

    pub fn task_completed(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }

    pub fn task_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> Statistics {
        // Finished counts are read first so that `submitted` is never behind them.
        let completed = self.completed.load(Ordering::Acquire);
        let panicked = self.panicked.load(Ordering::Acquire);
        Statistics {
            submitted: self.submitted.load(Ordering::Acquire),
            completed,
            panicked,
        }
    }
}
