use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{JobKind, JobState};

/// A point-in-time copy of a job, for progress displays and structured logs.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub name: String,
    pub kind: JobKind,
    pub state: JobState,
    pub done_work_units: u64,
    pub total_work_units: u64,
    pub cancelable: bool,
    pub logs: Vec<String>,
    /// Snapshots of the sub-jobs of an aggregator, in the order they were added.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_jobs: Vec<JobSnapshot>,
    pub taken_at: OffsetDateTime,
}

impl JobSnapshot {
    /// Progress as a fraction between 0 and 1. Finished jobs are always at 1, and jobs with an
    /// unknown total are at 0 until then.
    pub fn fraction_done(&self) -> f64 {
        if self.state == JobState::Finished {
            1.0
        } else if self.total_work_units == 0 {
            0.0
        } else {
            (self.done_work_units as f64 / self.total_work_units as f64).min(1.0)
        }
    }
}
