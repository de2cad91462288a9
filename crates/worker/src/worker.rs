//! A dedicated thread that runs submitted tasks one at a time, in submission order.

use std::{
    panic::AssertUnwindSafe,
    sync::Arc,
    thread::{JoinHandle, ThreadId},
};

use error_stack::{Report, ResultExt};
use flume::{Receiver, Sender};
use parking_lot::Mutex;

use crate::{
    stats::{Statistics, StatisticsTracker},
    Executor, ExecutorError, Task, WorkerConfig,
};

/// A single worker thread fed by a FIFO queue. Cloning a [Worker] gives another handle to the
/// same thread. The thread exits once every handle is dropped or [Worker::stop] is called, after
/// draining the tasks that were already queued.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

struct WorkerInner {
    name: String,
    tx: Mutex<Option<Sender<Task>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    stats: Arc<StatisticsTracker>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl Worker {
    /// Start a worker with the default configuration.
    pub fn new() -> Result<Worker, Report<ExecutorError>> {
        Self::with_config(WorkerConfig::default())
    }

    pub fn with_config(config: WorkerConfig) -> Result<Worker, Report<ExecutorError>> {
        let (tx, rx) = match config.queue_capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };

        let stats = Arc::new(StatisticsTracker::default());
        let thread_stats = stats.clone();
        let thread = std::thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || Self::run_loop(rx, thread_stats))
            .change_context(ExecutorError::ThreadSpawn)
            .attach_printable_lazy(|| format!("Worker {}", config.name))?;

        Ok(Worker {
            inner: Arc::new(WorkerInner {
                name: config.name,
                tx: Mutex::new(Some(tx)),
                thread_id: thread.thread().id(),
                thread: Mutex::new(Some(thread)),
                stats,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Return true if called from this worker's thread.
    pub fn is_current_thread(&self) -> bool {
        std::thread::current().id() == self.inner.thread_id
    }

    /// The number of tasks waiting in the queue, not counting the one currently running.
    pub fn pending(&self) -> usize {
        self.inner.tx.lock().as_ref().map(|tx| tx.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> Statistics {
        self.inner.stats.snapshot()
    }

    /// Stop accepting tasks and wait for the queued ones to finish. When called from the worker
    /// thread itself this does not wait, since the thread can't join itself.
    pub fn stop(&self) {
        self.inner.shutdown();
    }

    fn run_loop(rx: Receiver<Task>, stats: Arc<StatisticsTracker>) {
        while let Ok(task) = rx.recv() {
            match std::panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(()) => stats.task_completed(),
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::event!(tracing::Level::ERROR, "worker task panicked");
                    stats.task_panicked();
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::event!(tracing::Level::DEBUG, "worker queue closed");
    }
}

impl WorkerInner {
    fn shutdown(&self) {
        // Dropping the sender closes the queue once the remaining tasks are consumed.
        self.tx.lock().take();

        if std::thread::current().id() == self.thread_id {
            return;
        }

        if let Some(thread) = self.thread.lock().take() {
            thread.join().ok();
        }
    }
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Executor for Worker {
    fn submit(&self, task: Task) -> Result<(), Report<ExecutorError>> {
        let tx = self
            .inner
            .tx
            .lock()
            .clone()
            .ok_or(ExecutorError::ShutDown)
            .attach_printable_lazy(|| format!("Worker {}", self.inner.name))?;

        self.inner.stats.task_submitted();
        tx.send(task)
            .map_err(|_| {
                self.inner.stats.task_rejected();
                Report::new(ExecutorError::ShutDown)
            })
            .attach_printable_lazy(|| format!("Worker {}", self.inner.name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn runs_tasks_in_order() {
        let worker = Worker::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let seen = seen.clone();
            worker
                .submit(Box::new(move || seen.lock().push(i)))
                .unwrap();
        }

        worker.stop();
        assert_eq!(*seen.lock(), (0..10).collect::<Vec<_>>());
        assert_eq!(worker.stats().completed, 10);
    }

    #[test]
    fn submit_after_stop_fails() {
        let worker = Worker::new().unwrap();
        worker.stop();

        let err = worker.submit(Box::new(|| {})).unwrap_err();
        assert_eq!(err.current_context(), &ExecutorError::ShutDown);
    }

    #[test]
    fn survives_panicking_task() {
        let worker = Worker::new().unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        worker.submit(Box::new(|| panic!("boom"))).unwrap();
        let c = count.clone();
        worker
            .submit(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        worker.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        let stats = worker.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.submitted, 2);
    }

    #[test]
    fn completed_never_ahead_of_submitted() {
        let worker = Worker::new().unwrap();
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            let sampler = scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    let stats = worker.stats();
                    assert!(
                        stats.completed + stats.panicked <= stats.submitted,
                        "{stats:?}"
                    );
                }
            });

            for _ in 0..10_000 {
                worker.submit(Box::new(|| {})).unwrap();
            }
            worker.stop();
            done.store(true, Ordering::SeqCst);
            sampler.join().unwrap();
        });

        let stats = worker.stats();
        assert_eq!(stats.submitted, 10_000);
        assert_eq!(stats.completed, 10_000);

        assert!(worker.submit(Box::new(|| {})).is_err());
        assert_eq!(worker.stats().submitted, 10_000);
    }

    #[test]
    fn named_thread() {
        let worker = Worker::with_config(WorkerConfig {
            name: "io-worker".to_string(),
            queue_capacity: Some(2),
        })
        .unwrap();

        let (tx, rx) = flume::bounded(1);
        let w = worker.clone();
        worker
            .submit(Box::new(move || {
                let name = std::thread::current().name().map(|n| n.to_string());
                tx.send((name, w.is_current_thread())).ok();
            }))
            .unwrap();

        let (name, is_current) = rx.recv().unwrap();
        assert_eq!(name.as_deref(), Some("io-worker"));
        assert!(is_current);
        assert!(!worker.is_current_thread());
    }
}
