//! Per-caller job aggregation
//!
//! A [`Crew`] is the thin front-end over a [`Pool`]: it creates a [`Job`]
//! per submitted task, binds each one to a shared completion barrier, and
//! exposes a blocking [`join_all`](Crew::join_all) over the batch. The crew
//! only aggregates; all scheduling lives in the pool.

use crate::core::{Job, Result, WaitGroup};
use crate::pool::Pool;
use std::sync::Arc;
use std::time::Duration;

/// Aggregates jobs submitted by one caller and joins them as a batch
///
/// Jobs are returned by [`join_all`](Crew::join_all) in submission order;
/// their completion order is unspecified. After a join the crew is empty and
/// reusable: the same barrier serves the next batch.
///
/// # Example
///
/// ```rust
/// use workcrew::{Pool, PoolConfig};
///
/// # fn main() -> workcrew::Result<()> {
/// let pool = Pool::with_config(PoolConfig::new().with_max_workers(2))?;
/// let mut crew = pool.crew::<String>();
///
/// crew.submit(|| Ok("first".to_string()))?;
/// crew.submit(|| Ok("second".to_string()))?;
///
/// let jobs = crew.join_all();
/// assert_eq!(jobs.len(), 2);
/// assert_eq!(jobs[0].result().map(String::as_str), Some("first"));
/// assert_eq!(jobs[1].result().map(String::as_str), Some("second"));
/// # pool.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Crew<T> {
    pool: Pool,
    barrier: Arc<WaitGroup>,
    jobs: Vec<Job<T>>,
}

impl<T> std::fmt::Debug for Crew<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("submitted", &self.jobs.len())
            .field("pending", &self.barrier.pending())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Crew<T> {
    /// Create a crew submitting against `pool`
    pub fn new(pool: &Pool) -> Self {
        Self {
            pool: pool.clone(),
            barrier: Arc::new(WaitGroup::new()),
            jobs: Vec::new(),
        }
    }

    /// Submit a task and return its job handle
    ///
    /// Returns as soon as the task is handed to a worker; it does not wait
    /// for execution. Blocks while the pool is at capacity with no idle
    /// worker. Fails only when the task never reached a worker (for example
    /// the pool is shutting down); the batch barrier is rolled back in that
    /// case, so `join_all` is unaffected by failed submissions.
    pub fn submit<F>(&mut self, task: F) -> Result<Job<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.submit_with(task, None)
    }

    /// Like [`submit`](Crew::submit), but gives up after `timeout` waiting
    /// for pool capacity
    pub fn submit_timeout<F>(&mut self, task: F, timeout: Duration) -> Result<Job<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        self.submit_with(task, Some(timeout))
    }

    fn submit_with<F>(&mut self, task: F, timeout: Option<Duration>) -> Result<Job<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let job = Job::new(Arc::clone(&self.barrier));
        self.barrier.add(1);
        let dispatch = job.bind(task);

        let handed_over = match timeout {
            None => self.pool.dispatch(dispatch),
            Some(timeout) => self.pool.dispatch_timeout(dispatch, timeout),
        };
        if let Err(err) = handed_over {
            // The job never reached a worker; give its barrier slot back.
            self.barrier.done();
            return Err(err);
        }

        self.jobs.push(job.clone());
        Ok(job)
    }

    /// Block until every submitted job has completed, then return the batch
    ///
    /// Jobs are returned in submission order. The crew is left empty and its
    /// barrier reusable for the next batch.
    pub fn join_all(&mut self) -> Vec<Job<T>> {
        self.barrier.wait();
        std::mem::take(&mut self.jobs)
    }

    /// Number of jobs submitted since the last join
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether no jobs are pending a join
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// The pool this crew submits against
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_pool() -> Pool {
        Pool::with_config(
            PoolConfig::new()
                .with_max_workers(4)
                .with_thread_name_prefix("crew-test"),
        )
        .expect("failed to create pool")
    }

    #[test]
    fn test_join_all_returns_jobs_in_submission_order() {
        let pool = test_pool();
        let mut crew = pool.crew::<usize>();

        for i in 0..10 {
            crew.submit(move || Ok(i)).expect("submit failed");
        }
        let jobs = crew.join_all();

        assert_eq!(jobs.len(), 10);
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.result(), Some(&i));
        }
        pool.shutdown().expect("shutdown failed");
    }

    #[test]
    fn test_crew_is_reusable_after_join() {
        let pool = test_pool();
        let mut crew = pool.crew::<u32>();

        crew.submit(|| Ok(1)).expect("submit failed");
        let first = crew.join_all();
        assert_eq!(first.len(), 1);
        assert!(crew.is_empty());

        crew.submit(|| Ok(2)).expect("submit failed");
        crew.submit(|| Ok(3)).expect("submit failed");
        let second = crew.join_all();
        assert_eq!(second.len(), 2);

        pool.shutdown().expect("shutdown failed");
    }

    #[test]
    fn test_failed_submission_rolls_back_the_barrier() {
        let pool = test_pool();
        let mut crew = pool.crew::<u32>();
        pool.shutdown().expect("shutdown failed");

        let counter = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&counter);
        let result = crew.submit(move || {
            probe.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        });

        assert!(matches!(result, Err(crate::core::PoolError::ShuttingDown)));
        assert!(crew.is_empty());
        // A rolled-back submission must not leave join_all waiting.
        assert!(crew.join_all().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
