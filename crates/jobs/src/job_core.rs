//! The state shared by every kind of job: lifecycle state, work counters, logs and hooks.
//!
//! All of it sits behind a single lock. User code (hooks, and the task body in [Job](crate::Job))
//! is never called with that lock held. Operations collect the hooks they need to run into a
//! [Deferred] while locked, and the hooks are run once the lock is released.

use std::sync::Arc;

use error_stack::{Report, ResultExt};
use parking_lot::{Condvar, Mutex};
use tokio::sync::watch;
use tracing::{event, Level};
use uuid::Uuid;

use crate::{JobError, JobKind, JobState};

pub(crate) type WorkUnitsHook = Arc<dyn Fn(u64, u64) + Send + Sync>;
pub(crate) type LogHook = Arc<dyn Fn(&str) + Send + Sync>;
pub(crate) type StateHook = Arc<dyn Fn(JobState) + Send + Sync>;
pub(crate) type CancelHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Hooks {
    done_work: Vec<WorkUnitsHook>,
    total_work_units: Vec<WorkUnitsHook>,
    log: Vec<LogHook>,
    state: Vec<StateHook>,
    /// Drained on the first cancellation request.
    cancel: Vec<CancelHook>,
}

struct CoreState {
    state: JobState,
    done_work_units: u64,
    total_work_units: u64,
    cancel_requested: bool,
    cancelable: bool,
    logs: Vec<String>,
    hooks: Hooks,
}

/// Hook calls collected under the job lock, to be made after it has been released.
#[must_use]
#[derive(Default)]
pub(crate) struct Deferred {
    /// (new, old, hooks)
    total_work_units: Option<(u64, u64, Vec<WorkUnitsHook>)>,
    done_work: Option<(u64, u64, Vec<WorkUnitsHook>)>,
    logs: Vec<String>,
    log_hooks: Vec<LogHook>,
    states: Vec<JobState>,
    state_hooks: Vec<StateHook>,
    cancel: Vec<CancelHook>,
}

impl Deferred {
    pub fn merge(&mut self, other: Deferred) {
        if other.total_work_units.is_some() {
            self.total_work_units = other.total_work_units;
        }
        if other.done_work.is_some() {
            self.done_work = other.done_work;
        }
        if !other.logs.is_empty() {
            self.logs.extend(other.logs);
            self.log_hooks = other.log_hooks;
        }
        if !other.states.is_empty() {
            self.states.extend(other.states);
            self.state_hooks = other.state_hooks;
        }
        self.cancel.extend(other.cancel);
    }

    pub fn run(self) {
        if let Some((new, old, hooks)) = self.total_work_units {
            for hook in hooks {
                hook(new, old);
            }
        }

        if let Some((new, old, hooks)) = self.done_work {
            for hook in hooks {
                hook(new, old);
            }
        }

        for message in &self.logs {
            for hook in &self.log_hooks {
                hook(message);
            }
        }

        for state in self.states {
            for hook in &self.state_hooks {
                hook(state);
            }
        }

        for hook in self.cancel {
            hook();
        }
    }
}

pub(crate) struct JobCore {
    id: Uuid,
    name: String,
    kind: JobKind,
    inner: Mutex<CoreState>,
    /// Signalled when the job reaches a terminal state.
    terminal: Condvar,
    state_tx: watch::Sender<JobState>,
}

impl JobCore {
    pub fn new(name: String, kind: JobKind, state: JobState, total_work_units: u64) -> JobCore {
        let (state_tx, _) = watch::channel(state);
        JobCore {
            id: Uuid::now_v7(),
            name,
            kind,
            inner: Mutex::new(CoreState {
                state,
                done_work_units: 0,
                total_work_units,
                cancel_requested: false,
                cancelable: true,
                logs: Vec::new(),
                hooks: Hooks::default(),
            }),
            terminal: Condvar::new(),
            state_tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    pub fn done_work_units(&self) -> u64 {
        self.inner.lock().done_work_units
    }

    pub fn total_work_units(&self) -> u64 {
        self.inner.lock().total_work_units
    }

    /// State, done and total work units, read together.
    pub fn progress(&self) -> (JobState, u64, u64) {
        let inner = self.inner.lock();
        (inner.state, inner.done_work_units, inner.total_work_units)
    }

    pub fn logs(&self) -> Vec<String> {
        self.inner.lock().logs.clone()
    }

    pub fn cancel_requested(&self) -> bool {
        self.inner.lock().cancel_requested
    }

    pub fn is_cancelable(&self) -> bool {
        self.inner.lock().cancelable
    }

    pub fn set_cancelable(&self, cancelable: bool) {
        self.inner.lock().cancelable = cancelable;
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state_tx.subscribe()
    }

    fn transition(&self, inner: &mut CoreState, next: JobState, deferred: &mut Deferred) -> bool {
        let current = inner.state;
        if !current.can_become(next) {
            return false;
        }

        inner.state = next;
        self.state_tx.send_replace(next);
        if next.is_terminal() {
            self.terminal.notify_all();
        }

        event!(Level::DEBUG, job = %self.name, id = %self.id, from = %current, to = %next, "state changed");
        deferred.states.push(next);
        deferred.state_hooks = inner.hooks.state.clone();
        true
    }

    /// Move from Waiting to Running. Returns `None` if the job was not waiting.
    pub fn start(&self) -> Option<Deferred> {
        let mut deferred = Deferred::default();
        let mut inner = self.inner.lock();
        if inner.state != JobState::Waiting {
            return None;
        }

        self.transition(&mut inner, JobState::Running, &mut deferred);
        Some(deferred)
    }

    /// Running jobs become Finished, and Canceling jobs become Canceled. Anything else is left alone.
    pub fn finish(&self) -> Deferred {
        let mut deferred = Deferred::default();
        let mut inner = self.inner.lock();
        match inner.state {
            JobState::Running => {
                self.transition(&mut inner, JobState::Finished, &mut deferred);
            }
            JobState::Canceling => {
                self.transition(&mut inner, JobState::Canceled, &mut deferred);
            }
            _ => {}
        }
        deferred
    }

    /// Request cancellation. Waiting jobs are canceled right away. Running jobs become Canceling,
    /// or Canceled when `immediate` is set because there is no task to wait for.
    ///
    /// Returns `None` when cancellation was already requested or the job is done. Otherwise the
    /// returned [Deferred] carries the cancel hooks, which run exactly once.
    pub fn request_cancel(&self, immediate: bool) -> Option<Deferred> {
        let mut deferred = Deferred::default();
        let mut inner = self.inner.lock();
        let next = match inner.state {
            JobState::Waiting => JobState::Canceled,
            JobState::Running if immediate => JobState::Canceled,
            JobState::Running => JobState::Canceling,
            _ => return None,
        };

        inner.cancel_requested = true;
        self.transition(&mut inner, next, &mut deferred);
        deferred.cancel = std::mem::take(&mut inner.hooks.cancel);
        Some(deferred)
    }

    /// Advance the done counter to `units`, or to the total when `units` is `None`. The counter
    /// only moves forward, and is capped by the total once the total is known.
    pub fn done_work(&self, units: Option<u64>) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.inner.lock();
            let total = inner.total_work_units;
            let units = match units {
                Some(units) if total != 0 => units.min(total),
                Some(units) => units,
                None => total,
            };

            if units <= inner.done_work_units {
                return;
            }

            let old = std::mem::replace(&mut inner.done_work_units, units);
            deferred.done_work = Some((units, old, inner.hooks.done_work.clone()));
        }
        deferred.run();
    }

    pub fn set_total_work_units(&self, units: u64) {
        let mut deferred = Deferred::default();
        {
            let mut inner = self.inner.lock();
            if inner.total_work_units == units {
                return;
            }

            let old = std::mem::replace(&mut inner.total_work_units, units);
            deferred.total_work_units = Some((units, old, inner.hooks.total_work_units.clone()));
        }
        deferred.run();
    }

    /// Overwrite both counters without the forward-only rule. Aggregators use this to publish the
    /// weighted sum of their children.
    pub fn set_work_units(&self, total: u64, done: u64) -> Deferred {
        let mut deferred = Deferred::default();
        let mut inner = self.inner.lock();
        if inner.total_work_units != total {
            let old = std::mem::replace(&mut inner.total_work_units, total);
            deferred.total_work_units = Some((total, old, inner.hooks.total_work_units.clone()));
        }

        if inner.done_work_units != done {
            let old = std::mem::replace(&mut inner.done_work_units, done);
            deferred.done_work = Some((done, old, inner.hooks.done_work.clone()));
        }
        deferred
    }

    pub fn log(&self, message: String) {
        self.log_many(vec![message]);
    }

    pub fn log_many(&self, messages: Vec<String>) {
        if messages.is_empty() {
            return;
        }

        for message in &messages {
            event!(Level::TRACE, job = %self.name, %message, "job log");
        }

        let mut deferred = Deferred::default();
        {
            let mut inner = self.inner.lock();
            inner.logs.extend(messages.iter().cloned());
            deferred.log_hooks = inner.hooks.log.clone();
        }
        deferred.logs = messages;
        deferred.run();
    }

    pub fn add_done_work_hook(&self, hook: WorkUnitsHook) {
        self.inner.lock().hooks.done_work.push(hook);
    }

    pub fn add_total_work_units_hook(&self, hook: WorkUnitsHook) {
        self.inner.lock().hooks.total_work_units.push(hook);
    }

    pub fn add_state_hook(&self, hook: StateHook) {
        self.inner.lock().hooks.state.push(hook);
    }

    /// Register a log hook, and return the messages logged before it was registered.
    pub fn add_log_hook(&self, hook: LogHook) -> Vec<String> {
        let mut inner = self.inner.lock();
        inner.hooks.log.push(hook);
        inner.logs.clone()
    }

    /// Register a hook to run when cancellation is requested. If it already was, the hook runs
    /// now, on the calling thread.
    pub fn add_cancel_hook(&self, hook: CancelHook) {
        let mut inner = self.inner.lock();
        if inner.cancel_requested {
            drop(inner);
            hook();
        } else {
            inner.hooks.cancel.push(hook);
        }
    }

    /// Block until the job is Finished or Canceled.
    pub fn wait(&self) -> Result<(), Report<JobError>> {
        let mut inner = self.inner.lock();
        if inner.state == JobState::Waiting {
            return Err(Report::new(JobError::StillWaiting))
                .attach_printable_lazy(|| format!("Job {}", self.name));
        }

        while !inner.state.is_terminal() {
            self.terminal.wait(&mut inner);
        }

        Ok(())
    }

    /// The async version of [JobCore::wait].
    pub async fn completed(&self) -> Result<(), Report<JobError>> {
        let mut rx = self.state_tx.subscribe();
        let state = *rx.borrow_and_update();
        if state == JobState::Waiting {
            return Err(Report::new(JobError::StillWaiting))
                .attach_printable_lazy(|| format!("Job {}", self.name));
        }

        rx.wait_for(|state| state.is_terminal())
            .await
            .change_context(JobError::StateChannelClosed)?;
        Ok(())
    }
}

impl std::fmt::Debug for JobCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (state, done, total) = self.progress();
        f.debug_struct("JobCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &state)
            .field("done_work_units", &done)
            .field("total_work_units", &total)
            .finish()
    }
}
