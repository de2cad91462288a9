/// Methods that every job kind exposes, delegating to its `core` field.
macro_rules! common_job_methods {
    () => {
        /// The unique ID of the job.
        pub fn id(&self) -> uuid::Uuid {
            self.core.id()
        }

        pub fn name(&self) -> &str {
            self.core.name()
        }

        pub fn kind(&self) -> $crate::JobKind {
            self.core.kind()
        }

        pub fn state(&self) -> $crate::JobState {
            self.core.state()
        }

        pub fn done_work_units(&self) -> u64 {
            self.core.done_work_units()
        }

        /// The amount of work expected in total. Zero means it is not known.
        pub fn total_work_units(&self) -> u64 {
            self.core.total_work_units()
        }

        /// A copy of the messages logged so far, in order.
        pub fn logs(&self) -> Vec<String> {
            self.core.logs()
        }

        pub fn log(&self, message: impl Into<String>) {
            self.core.log(message.into());
        }

        /// A callback that appends to this job's logs, for code that only takes a plain closure.
        pub fn log_callback(&self) -> impl Fn(&str) + Send + Sync + 'static {
            let core = self.core.clone();
            move |message: &str| core.log(message.to_string())
        }

        pub fn cancel_requested(&self) -> bool {
            self.core.cancel_requested()
        }

        /// A callback returning whether cancellation has been requested, meant to be polled from
        /// inside long-running loops.
        pub fn cancel_requested_callback(&self) -> impl Fn() -> bool + Send + Sync + 'static {
            let core = self.core.clone();
            move || core.cancel_requested()
        }

        /// Whether a UI should offer to cancel this job. This is advisory and does not affect
        /// `cancel()`.
        pub fn is_cancelable(&self) -> bool {
            self.core.is_cancelable()
        }

        pub fn set_cancelable(&self, cancelable: bool) {
            self.core.set_cancelable(cancelable);
        }

        /// Run `hook` once when cancellation is first requested. If it already has been, `hook`
        /// runs immediately on the calling thread.
        pub fn add_simple_cancel_hook(&self, hook: impl FnOnce() + Send + 'static) {
            self.core.add_cancel_hook(Box::new(hook));
        }

        /// Call `hook(new, old)` whenever the done counter changes.
        pub fn add_done_work_hook(&self, hook: impl Fn(u64, u64) + Send + Sync + 'static) {
            self.core.add_done_work_hook(std::sync::Arc::new(hook));
        }

        /// Call `hook(new, old)` whenever the total changes.
        pub fn add_total_work_units_hook(&self, hook: impl Fn(u64, u64) + Send + Sync + 'static) {
            self.core.add_total_work_units_hook(std::sync::Arc::new(hook));
        }

        /// Call `hook` for every message logged from now on.
        pub fn add_log_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
            self.core.add_log_hook(std::sync::Arc::new(hook));
        }

        /// Call `hook` with the new state after every state change.
        pub fn add_state_hook(&self, hook: impl Fn($crate::JobState) + Send + Sync + 'static) {
            self.core.add_state_hook(std::sync::Arc::new(hook));
        }

        /// Watch the job state from async code.
        pub fn subscribe(&self) -> tokio::sync::watch::Receiver<$crate::JobState> {
            self.core.subscribe()
        }

        /// Block until the job is Finished or Canceled. Fails with
        /// [JobError::StillWaiting](crate::JobError::StillWaiting) if the job was never started.
        pub fn wait(&self) -> Result<(), error_stack::Report<$crate::JobError>> {
            self.core.wait()
        }

        /// A handle that resolves when the job reaches a terminal state.
        pub fn future(&self) -> $crate::JobFuture {
            $crate::JobFuture::new(self.core.clone())
        }

        pub fn snapshot(&self) -> $crate::JobSnapshot {
            $crate::AnyJob::from(self.clone()).snapshot()
        }
    };
}

/// Progress setters for the job kinds whose counters are driven by their owner. Aggregators
/// derive theirs from their children instead.
macro_rules! progress_methods {
    () => {
        /// Advance the done counter to `units`. Lower values are ignored, and the value is capped
        /// by the total when the total is known.
        pub fn done_work(&self, units: u64) {
            self.core.done_work(Some(units));
        }

        /// Mark all of the work as done. This does nothing while the total is unknown.
        pub fn done(&self) {
            self.core.done_work(None);
        }

        pub fn set_total_work_units(&self, units: u64) {
            self.core.set_total_work_units(units);
        }

        /// A callback that advances the done counter, for algorithms that report progress through
        /// a plain closure. Out-of-order values from concurrent callers never move it backward.
        pub fn progress_callback(&self) -> impl Fn(u64) + Send + Sync + 'static {
            let core = self.core.clone();
            move |units| core.done_work(Some(units))
        }
    };
}
