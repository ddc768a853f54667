//! Job handles and dispatched work units
//!
//! A [`Job`] is the caller-facing handle for one submitted task. The worker
//! that executes the task records its outcome exactly once; after that the
//! handle is immutable and safe to read from any thread. The blocking
//! accessors first wait on the batch's shared completion barrier, then
//! return the cached outcome, so repeated calls on a settled job never block
//! again.

use crate::core::barrier::WaitGroup;
use crate::core::error::{PoolError, Result};
use log::warn;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Shared per-job state, written once by the executing worker
struct JobState<T> {
    id: Uuid,
    barrier: Arc<WaitGroup>,
    outcome: OnceLock<Result<T>>,
    settled: AtomicBool,
}

/// Handle to one submitted task and its outcome
///
/// Cloning a `Job` yields another handle to the same task; all clones
/// observe the same outcome. The blocking accessors ([`is_success`],
/// [`result`], [`error`]) wait on the batch's shared completion barrier the
/// first time they are called, mirroring the batch semantics of
/// [`Crew::join_all`](crate::crew::Crew::join_all).
///
/// [`is_success`]: Job::is_success
/// [`result`]: Job::result
/// [`error`]: Job::error
pub struct Job<T> {
    state: Arc<JobState<T>>,
}

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.state.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Job<T> {
    pub(crate) fn new(barrier: Arc<WaitGroup>) -> Self {
        Self {
            state: Arc::new(JobState {
                id: Uuid::new_v4(),
                barrier,
                outcome: OnceLock::new(),
                settled: AtomicBool::new(false),
            }),
        }
    }

    /// Wrap `task` into a dispatchable unit that settles this job.
    ///
    /// The wrapper catches panics, records the outcome, and releases the
    /// job's barrier slot on every exit path, so a faulting task can neither
    /// kill its worker nor leave a batch waiting forever.
    pub(crate) fn bind<F>(&self, task: F) -> Dispatch
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        Dispatch::new(self.state.id, move || {
            let outcome = match catch_unwind(AssertUnwindSafe(task)) {
                Ok(result) => result,
                Err(payload) => Err(PoolError::from_panic(payload)),
            };
            if state.outcome.set(outcome).is_err() {
                warn!("job {}: outcome recorded twice", state.id);
            }
            state.barrier.done();
        })
    }
}

impl<T> Job<T> {
    /// Unique identifier of this job
    pub fn id(&self) -> Uuid {
        self.state.id
    }

    /// Whether this job's task has finished, without blocking
    pub fn is_finished(&self) -> bool {
        self.state.outcome.get().is_some()
    }

    /// Block until the batch this job belongs to has completed
    ///
    /// Idempotent: once the barrier has been satisfied, later calls return
    /// immediately without touching it again.
    pub fn wait(&self) {
        if self.state.settled.load(Ordering::Acquire) {
            return;
        }
        self.state.barrier.wait();
        self.state.settled.store(true, Ordering::Release);
    }

    /// Block until completion, then report whether the task ran without fault
    ///
    /// A task is successful when it returned `Ok` and did not panic.
    pub fn is_success(&self) -> bool {
        self.wait();
        matches!(self.state.outcome.get(), Some(Ok(_)))
    }

    /// Block until completion, then return the task's value
    ///
    /// Returns `None` if the task failed or panicked; the fault is available
    /// through [`error`](Job::error).
    pub fn result(&self) -> Option<&T> {
        self.wait();
        match self.state.outcome.get() {
            Some(Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// Block until completion, then return the task's fault, if any
    pub fn error(&self) -> Option<&PoolError> {
        self.wait();
        match self.state.outcome.get() {
            Some(Err(err)) => Some(err),
            _ => None,
        }
    }
}

/// A type-erased unit of work handed to a worker's delivery queue
pub(crate) struct Dispatch {
    id: Uuid,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl Dispatch {
    pub(crate) fn new(id: Uuid, run: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            run: Box::new(run),
        }
    }

    /// A dispatch with no job handle attached, for fire-and-forget work
    pub(crate) fn fire_and_forget(task: impl FnOnce() + Send + 'static) -> Self {
        Self::new(Uuid::new_v4(), task)
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn run(self) {
        (self.run)();
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch").field("id", &self.id).finish()
    }
}
