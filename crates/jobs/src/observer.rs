use std::sync::Arc;

use tracing::instrument;

use crate::{job_core::JobCore, JobFuture, JobKind, JobState};

/// A job with no task of its own. It starts out Running and its owner reports progress into it,
/// which makes it a bridge for work that already happens somewhere else.
#[derive(Clone, Debug)]
pub struct Observer {
    pub(crate) core: Arc<JobCore>,
}

impl Observer {
    pub const DEFAULT_TOTAL_WORK_UNITS: u64 = 100;

    /// Create an observer expecting [Observer::DEFAULT_TOTAL_WORK_UNITS] units of work.
    pub fn new(name: impl Into<String>) -> Observer {
        Self::with_total_work_units(name, Self::DEFAULT_TOTAL_WORK_UNITS)
    }

    pub fn with_total_work_units(name: impl Into<String>, total_work_units: u64) -> Observer {
        Observer {
            core: Arc::new(JobCore::new(
                name.into(),
                JobKind::Observer,
                JobState::Running,
                total_work_units,
            )),
        }
    }

    common_job_methods!();
    progress_methods!();

    /// Report that the observed work is over. The observer becomes Finished, or stays Canceled if
    /// it was canceled first.
    pub fn finish(&self) {
        self.core.finish().run();
    }

    /// Flag the observed work as canceled. The observer becomes Canceled right away, since there
    /// is no task to wait for. The work itself is not interrupted; its owner is expected to check
    /// [Observer::cancel_requested] or use a cancel hook.
    #[instrument(level = "debug", skip(self), fields(job = %self.name()))]
    pub fn cancel(&self) -> JobFuture {
        if let Some(canceled) = self.core.request_cancel(true) {
            canceled.run();
        }
        self.future()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use jobweave_worker::Worker;

    use super::*;
    use crate::{test_util::algo_mock_generic_callback, Job};

    #[test]
    fn cancel_then_finish() {
        let job = Observer::new("Observer");
        assert_eq!(job.state(), JobState::Running);

        let waiter = {
            let job = job.clone();
            std::thread::spawn(move || job.wait().is_ok())
        };

        assert!(!job.cancel_requested());
        assert!(!job.cancel_requested_callback()());

        job.cancel();
        assert_eq!(job.state(), JobState::Canceled);
        job.finish();
        assert_eq!(job.state(), JobState::Canceled);

        assert!(job.cancel_requested());
        assert!(job.cancel_requested_callback()());
        job.wait().unwrap();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn finish_then_cancel() {
        let job = Observer::new("Observer");
        job.finish();
        assert_eq!(job.state(), JobState::Finished);

        job.cancel();
        assert_eq!(job.state(), JobState::Finished);
        assert!(!job.cancel_requested());
        assert!(!job.cancel_requested_callback()());
        job.wait().unwrap();
    }

    #[test]
    fn generic_callback() {
        let job = Observer::new("GenericCallbackJob");
        algo_mock_generic_callback(
            100,
            job.progress_callback(),
            job.cancel_requested_callback(),
            None,
        );
        assert_eq!(job.state(), JobState::Running);

        job.finish();
        assert_eq!(job.done_work_units(), 100);
        assert_eq!(job.state(), JobState::Finished);
    }

    #[test]
    fn fractional_progress_observer() {
        // An algorithm that reports a fraction in [0, 1] instead of work units.
        fn run_algo(n: usize, notify: impl Fn(f64)) {
            for i in 0..n {
                notify((i + 1) as f64 / n as f64);
            }
        }

        let job = Observer::new("FractionJob");
        let total = job.total_work_units();
        let j = job.clone();
        run_algo(100, move |p| j.done_work((p * total as f64) as u64));
        job.finish();
        assert_eq!(job.done_work_units(), 100);
    }

    #[test]
    fn observer_inside_worker_job() {
        let worker = Worker::new().unwrap();
        let observer = Observer::with_total_work_units("Inner", 10);
        let o = observer.clone();
        let job = Job::with_executor(
            "Outer",
            move |_| {
                for i in 1..=10 {
                    o.done_work(i);
                }
                o.finish();
            },
            worker,
        );

        job.run().wait().unwrap();
        observer.wait().unwrap();
        assert_eq!(observer.state(), JobState::Finished);
        assert_eq!(observer.done_work_units(), 10);
    }

    #[test]
    fn default_total() {
        let job = Observer::new("Observer");
        assert_eq!(job.total_work_units(), 100);
        job.done();
        assert_eq!(job.done_work_units(), 100);

        let job = Observer::with_total_work_units("Observer", 444);
        assert_eq!(job.total_work_units(), 444);
    }

    #[test]
    fn wait_returns_after_finish_from_other_thread() {
        let job = Observer::new("Observer");
        let j = job.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            j.finish();
        });

        job.wait().unwrap();
        assert_eq!(job.state(), JobState::Finished);
        handle.join().unwrap();
    }
}
