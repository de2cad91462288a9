use std::{future::IntoFuture, sync::Arc};

use error_stack::Report;
use futures::{future::BoxFuture, FutureExt};

use crate::{job_core::JobCore, JobError, JobState};

/// A handle to the eventual completion of a job, returned by `run()` and `cancel()`.
///
/// It can be waited on from blocking code with [JobFuture::wait], or `.await`ed.
#[derive(Clone, Debug)]
pub struct JobFuture {
    core: Arc<JobCore>,
}

impl JobFuture {
    pub(crate) fn new(core: Arc<JobCore>) -> JobFuture {
        JobFuture { core }
    }

    /// True once the job is Finished or Canceled.
    pub fn is_ready(&self) -> bool {
        self.core.state().is_terminal()
    }

    pub fn state(&self) -> JobState {
        self.core.state()
    }

    /// Block until the job is Finished or Canceled.
    pub fn wait(&self) -> Result<(), Report<JobError>> {
        self.core.wait()
    }
}

impl IntoFuture for JobFuture {
    type Output = Result<(), Report<JobError>>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let core = self.core;
        async move { core.completed().await }.boxed()
    }
}

/// Wait for all of the jobs to reach a terminal state.
pub async fn wait_all(
    futures: impl IntoIterator<Item = JobFuture>,
) -> Result<(), Report<JobError>> {
    futures::future::try_join_all(futures.into_iter().map(IntoFuture::into_future)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jobweave_worker::{TokioExecutor, Worker};

    use super::*;
    use crate::{Job, Observer};

    #[tokio::test]
    async fn await_worker_job() {
        let worker = Worker::new().unwrap();
        let job = Job::with_executor(
            "Job",
            |job| {
                std::thread::sleep(Duration::from_millis(10));
                job.set_total_work_units(5);
                job.done();
            },
            worker,
        );

        job.run().await.unwrap();
        assert_eq!(job.state(), JobState::Finished);
        assert_eq!(job.done_work_units(), 5);
    }

    #[tokio::test]
    async fn await_unstarted_job_fails() {
        let job = Job::new("Job", |_| {});
        let err = job.future().await.unwrap_err();
        assert_eq!(err.current_context(), &JobError::StillWaiting);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wait_all_on_tokio_executor() {
        let executor = TokioExecutor::try_current().unwrap();
        let jobs = (0..4)
            .map(|i| {
                Job::with_executor(
                    format!("Job {i}"),
                    |job| {
                        job.set_total_work_units(10);
                        for i in 1..=10 {
                            job.done_work(i);
                        }
                    },
                    executor.clone(),
                )
            })
            .collect::<Vec<_>>();

        wait_all(jobs.iter().map(|job| job.run())).await.unwrap();
        for job in &jobs {
            assert_eq!(job.state(), JobState::Finished);
            assert_eq!(job.done_work_units(), 10);
        }
    }

    #[tokio::test]
    async fn observer_finished_elsewhere() {
        let observer = Observer::new("Observer");
        let o = observer.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            o.finish();
        });

        let future = observer.future();
        assert!(!future.is_ready());
        future.await.unwrap();
        assert_eq!(observer.state(), JobState::Finished);
    }
}
