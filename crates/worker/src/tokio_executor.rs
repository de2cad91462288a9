use error_stack::Report;
use tokio::runtime::Handle;

use crate::{Executor, ExecutorError, Task};

/// Run tasks on the blocking thread pool of a tokio runtime. Job tasks are plain blocking
/// closures, so they go through `spawn_blocking` rather than onto the async worker threads.
///
/// Unlike a [Worker](crate::Worker), tasks submitted here may run concurrently and in any order.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime that the caller is currently running inside of, if any.
    pub fn try_current() -> Result<Self, Report<ExecutorError>> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Report::new(ExecutorError::NoRuntime).attach_printable(e.to_string()))
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, task: Task) -> Result<(), Report<ExecutorError>> {
        // Completion is reported through the job itself, so the JoinHandle is not needed.
        self.handle.spawn_blocking(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_on_blocking_pool() {
        let executor = TokioExecutor::try_current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        executor
            .submit(Box::new(move || {
                tx.send(42).ok();
            }))
            .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }

    #[test]
    fn no_runtime() {
        let err = TokioExecutor::try_current().unwrap_err();
        assert_eq!(err.current_context(), &ExecutorError::NoRuntime);
    }
}
