//! Worker pool implementation
//!
//! The pool keeps a free list of idle workers sorted ascending by last-use
//! time. The ordering is not maintained by sorting: released workers are
//! appended at the tail with a fresh timestamp and acquisition pops the
//! head, a FIFO discipline that keeps the list sorted by construction. The
//! scavenger relies on that ordering to binary-search the eviction boundary
//! during its periodic sweep.

use crate::core::error::{PoolError, Result};
use crate::core::Dispatch;
use crate::crew::Crew;
use crate::pool::worker::{Directive, IdleWorker, Worker};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default cap on concurrently alive workers
pub const DEFAULT_MAX_WORKERS: usize = 512 * 1024;

/// Default idle threshold for eviction, also the scavenger sweep interval
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(10 * 60);

/// Configuration for a worker pool
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Upper bound on concurrently alive workers
    pub max_workers: usize,
    /// Idle threshold for worker eviction; also the scavenger sweep interval
    pub max_idle: Duration,
    /// Per-worker delivery queue depth.
    ///
    /// `None` probes the machine: 0 (a rendezvous handoff) when only one CPU
    /// is available, 1 otherwise so a dispatching caller is not stalled
    /// behind a CPU-bound task.
    pub queue_depth: Option<usize>,
    /// Prefix for worker and scavenger thread names
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            max_idle: DEFAULT_MAX_IDLE,
            queue_depth: None,
            thread_name_prefix: "worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrently alive workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set the idle eviction threshold (and scavenger sweep interval)
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set an explicit per-worker delivery queue depth
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = Some(depth);
        self
    }

    /// Set the thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(PoolError::invalid_config(
                "max_workers",
                "must be greater than 0",
            ));
        }
        if self.max_idle.is_zero() {
            return Err(PoolError::invalid_config(
                "max_idle",
                "idle duration must be non-zero",
            ));
        }
        Ok(())
    }

    pub(crate) fn effective_queue_depth(&self) -> usize {
        self.queue_depth
            .unwrap_or_else(|| if num_cpus::get() > 1 { 1 } else { 0 })
    }
}

/// State guarded by the pool mutex
#[derive(Default)]
struct PoolInner {
    /// Idle workers, sorted ascending by last-use time
    idle: VecDeque<IdleWorker>,
    /// Count of alive workers, idle or executing
    active: usize,
    stopping: bool,
    next_worker_id: usize,
}

/// Shared pool state; workers and the scavenger hold weak references
pub(crate) struct PoolCore {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
    /// Signalled when a worker is released, a worker exits, or the pool stops
    available: Condvar,
    stop_tx: Sender<()>,
    scavenger: Mutex<Option<JoinHandle<()>>>,
}

impl PoolCore {
    /// Block until a worker is available, spawning one while under capacity.
    ///
    /// With no deadline this waits indefinitely: capacity exhaustion is
    /// backpressure, not an error.
    fn checkout(self: &Arc<Self>, timeout: Option<Duration>) -> Result<Sender<Directive>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.inner.lock();
        loop {
            if inner.stopping {
                return Err(PoolError::ShuttingDown);
            }

            // Head of the free list is the least recently used worker.
            if let Some(idle) = inner.idle.pop_front() {
                return Ok(idle.sender);
            }

            if inner.active < self.config.max_workers {
                inner.active += 1;
                let id = inner.next_worker_id;
                inner.next_worker_id += 1;
                drop(inner);

                return match Worker::spawn(
                    id,
                    self.config.effective_queue_depth(),
                    &self.config.thread_name_prefix,
                    Arc::downgrade(self),
                ) {
                    Ok(sender) => Ok(sender),
                    Err(err) => {
                        let mut inner = self.inner.lock();
                        inner.active -= 1;
                        self.available.notify_one();
                        Err(err)
                    }
                };
            }

            match deadline {
                None => self.available.wait(&mut inner),
                Some(deadline) => {
                    if self.available.wait_until(&mut inner, deadline).timed_out() {
                        let timeout = timeout.unwrap_or_default();
                        return Err(PoolError::dispatch_timeout(timeout.as_millis() as u64));
                    }
                }
            }
        }
    }

    /// Return a worker to the free list after it finished a job.
    ///
    /// Returns `false` when the pool is stopping, instructing the worker to
    /// terminate instead. The timestamp is taken under the lock so tail
    /// appends cannot reorder and break the free list's sortedness.
    pub(crate) fn release(&self, sender: &Sender<Directive>) -> bool {
        let mut inner = self.inner.lock();
        if inner.stopping {
            return false;
        }
        inner.idle.push_back(IdleWorker {
            sender: sender.clone(),
            last_used: Instant::now(),
        });
        self.available.notify_one();
        true
    }

    /// Account for a terminated worker and wake anyone waiting on capacity
    pub(crate) fn worker_exited(&self, id: usize) {
        {
            let mut inner = self.inner.lock();
            inner.active = inner.active.saturating_sub(1);
        }
        // A waiter may now spawn a replacement, and shutdown may be waiting
        // for the active count to drain.
        self.available.notify_all();
        debug!("worker {id} retired");
    }

    /// Evict every worker idle longer than the configured threshold.
    ///
    /// The free list is sorted ascending by last-use time, so a binary
    /// search finds the eviction boundary; entries before it are drained
    /// under the lock and notified outside it, because a rendezvous send can
    /// block until the worker picks the sentinel up.
    fn sweep_idle(&self) {
        let Some(cutoff) = Instant::now().checked_sub(self.config.max_idle) else {
            return;
        };

        let expired: Vec<IdleWorker> = {
            let mut inner = self.inner.lock();
            let boundary = inner.idle.partition_point(|w| w.last_used < cutoff);
            if boundary == 0 {
                return;
            }
            inner.idle.drain(..boundary).collect()
        };

        debug!("scavenger: evicting {} idle worker(s)", expired.len());
        for worker in expired {
            let _ = worker.sender.send(Directive::Shutdown);
        }
    }

    /// Stop accepting work and notify every idle worker to terminate
    fn begin_shutdown(&self) {
        let evicted: Vec<IdleWorker> = {
            let mut inner = self.inner.lock();
            if inner.stopping {
                Vec::new()
            } else {
                inner.stopping = true;
                inner.idle.drain(..).collect()
            }
        };
        self.available.notify_all();
        let _ = self.stop_tx.send(());
        for worker in evicted {
            let _ = worker.sender.send(Directive::Shutdown);
        }
    }

    /// Wait until every worker, in-flight or evicted, has terminated
    fn await_quiescence(&self) {
        let mut inner = self.inner.lock();
        while inner.active > 0 {
            self.available.wait(&mut inner);
        }
    }

    fn join_scavenger(&self) -> Result<()> {
        let handle = self.scavenger.lock().take();
        if let Some(handle) = handle {
            // The last pool handle can be dropped from the scavenger itself
            // mid-sweep; joining our own thread would deadlock.
            if handle.thread().id() != thread::current().id() {
                handle
                    .join()
                    .map_err(|_| PoolError::join("scavenger", "scavenger thread panicked"))?;
            }
        }
        Ok(())
    }
}

impl Drop for PoolCore {
    fn drop(&mut self) {
        self.begin_shutdown();
        // No quiescence wait here: in-flight workers can no longer upgrade
        // their weak reference and exit on their own.
        let _ = self.join_scavenger();
    }
}

/// Background loop evicting workers idle past the configured threshold.
///
/// Runs for the lifetime of the pool: it stops on an explicit shutdown
/// signal, when every pool handle has been dropped (channel disconnect), or
/// when the core is gone by the time a sweep fires.
fn scavenge(core: Weak<PoolCore>, stop: Receiver<()>, interval: Duration) {
    debug!("scavenger started, sweeping every {interval:?}");
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let Some(core) = core.upgrade() else {
                    break;
                };
                core.sweep_idle();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("scavenger stopped");
}

static GLOBAL_POOL: OnceLock<Pool> = OnceLock::new();

/// A bounded pool of reusable worker threads
///
/// Workers are created lazily up to [`PoolConfig::max_workers`] and reused
/// in least-recently-used-first order. When every worker is busy and the cap
/// is reached, dispatch blocks until one is released; this is deliberate
/// backpressure, with the `_timeout` variants as the only escape hatch. A
/// background scavenger evicts workers idle longer than
/// [`PoolConfig::max_idle`].
///
/// `Pool` is a cheap clonable handle; clones share the same pool. Dropping
/// the last handle tears the pool down without waiting for in-flight jobs.
///
/// # Example
///
/// ```rust
/// use workcrew::{Pool, PoolConfig};
///
/// # fn main() -> workcrew::Result<()> {
/// let pool = Pool::with_config(PoolConfig::new().with_max_workers(4))?;
///
/// let mut crew = pool.crew::<u64>();
/// for i in 0..8u64 {
///     crew.submit(move || Ok(i * i))?;
/// }
/// let jobs = crew.join_all();
/// let total: u64 = jobs.iter().filter_map(|job| job.result().copied()).sum();
/// assert_eq!(total, 140);
///
/// pool.shutdown()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pool {
    core: Arc<PoolCore>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.core.inner.lock();
        f.debug_struct("Pool")
            .field("max_workers", &self.core.config.max_workers)
            .field("active", &inner.active)
            .field("idle", &inner.idle.len())
            .field("stopping", &inner.stopping)
            .finish()
    }
}

impl Pool {
    /// Create a pool with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with a custom configuration and start its scavenger
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let (stop_tx, stop_rx) = unbounded();
        let interval = config.max_idle;
        let scavenger_name = format!("{}-scavenger", config.thread_name_prefix);

        let core = Arc::new(PoolCore {
            config,
            inner: Mutex::new(PoolInner::default()),
            available: Condvar::new(),
            stop_tx,
            scavenger: Mutex::new(None),
        });

        let weak = Arc::downgrade(&core);
        let handle = thread::Builder::new()
            .name(scavenger_name.clone())
            .spawn(move || scavenge(weak, stop_rx, interval))
            .map_err(|e| {
                PoolError::spawn_with_source(scavenger_name, "cannot create scavenger thread", e)
            })?;
        *core.scavenger.lock() = Some(handle);

        Ok(Self { core })
    }

    /// Handle to the process-wide shared pool, built on first use
    ///
    /// Equivalent to [`global_with_config`](Pool::global_with_config) with
    /// the default configuration.
    pub fn global() -> Result<Self> {
        Self::global_with_config(PoolConfig::default())
    }

    /// Handle to the process-wide shared pool, constructing it on first call
    ///
    /// Construct-once semantics: the first call's configuration wins and
    /// every later call returns the same pool, silently ignoring its
    /// options. This mirrors the historical behavior of the interface and is
    /// deliberate; use [`with_config`](Pool::with_config) for an
    /// independently configured pool.
    pub fn global_with_config(config: PoolConfig) -> Result<Self> {
        if let Some(pool) = GLOBAL_POOL.get() {
            return Ok(pool.clone());
        }
        let pool = Pool::with_config(config)?;
        match GLOBAL_POOL.set(pool.clone()) {
            Ok(()) => Ok(pool),
            // Lost the construction race; the extra pool tears down on drop.
            Err(_) => Ok(GLOBAL_POOL.get().cloned().unwrap_or(pool)),
        }
    }

    /// Create a crew that aggregates jobs submitted against this pool
    pub fn crew<T: Send + Sync + 'static>(&self) -> Crew<T> {
        Crew::new(self)
    }

    /// Run a bare closure on a pooled worker, fire and forget
    ///
    /// Blocks while the pool is at capacity with no idle worker. Panics in
    /// `task` are caught and logged by the executing worker.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(Dispatch::fire_and_forget(task))
    }

    /// Like [`execute`](Pool::execute), but gives up after `timeout` waiting
    /// for capacity
    pub fn execute_timeout<F>(&self, task: F, timeout: Duration) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch_timeout(Dispatch::fire_and_forget(task), timeout)
    }

    pub(crate) fn dispatch(&self, dispatch: Dispatch) -> Result<()> {
        let sender = self.core.checkout(None)?;
        sender
            .send(Directive::Run(dispatch))
            .map_err(|_| PoolError::Delivery)
    }

    pub(crate) fn dispatch_timeout(&self, dispatch: Dispatch, timeout: Duration) -> Result<()> {
        let sender = self.core.checkout(Some(timeout))?;
        sender
            .send(Directive::Run(dispatch))
            .map_err(|_| PoolError::Delivery)
    }

    /// Shut the pool down and wait for every worker to terminate
    ///
    /// Stops accepting work (blocked dispatchers observe
    /// [`PoolError::ShuttingDown`]), evicts all idle workers, stops the
    /// scavenger, and blocks until in-flight workers finish their current
    /// job and exit. Idempotent. Must not be called from inside a pool task:
    /// the caller would wait for itself.
    pub fn shutdown(&self) -> Result<()> {
        self.core.begin_shutdown();
        self.core.await_quiescence();
        self.core.join_scavenger()
    }

    /// Number of alive workers, idle or executing
    pub fn active_workers(&self) -> usize {
        self.core.inner.lock().active
    }

    /// Number of workers parked in the free list
    pub fn idle_workers(&self) -> usize {
        self.core.inner.lock().idle.len()
    }

    /// Configured cap on concurrently alive workers
    pub fn max_workers(&self) -> usize {
        self.core.config.max_workers
    }

    /// Configured idle eviction threshold
    pub fn max_idle(&self) -> Duration {
        self.core.config.max_idle
    }

    /// Whether the pool has been shut down
    pub fn is_shutdown(&self) -> bool {
        self.core.inner.lock().stopping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WaitGroup;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn small_pool(max_workers: usize) -> Pool {
        Pool::with_config(
            PoolConfig::new()
                .with_max_workers(max_workers)
                .with_max_idle(Duration::from_secs(60))
                .with_thread_name_prefix("test-worker"),
        )
        .expect("failed to create pool")
    }

    /// Poll until `predicate` holds or the deadline passes
    fn eventually(predicate: impl Fn() -> bool, deadline: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        predicate()
    }

    #[test]
    fn test_workers_spawn_lazily() {
        let pool = small_pool(8);
        assert_eq!(pool.active_workers(), 0);
        assert_eq!(pool.idle_workers(), 0);

        let barrier = Arc::new(WaitGroup::new());
        barrier.add(1);
        let signal = Arc::clone(&barrier);
        pool.execute(move || signal.done()).expect("dispatch failed");
        barrier.wait();

        assert!(pool.active_workers() >= 1);
        pool.shutdown().expect("shutdown failed");
    }

    #[test]
    fn test_finished_workers_are_reused() {
        let pool = small_pool(8);

        for _ in 0..16 {
            let barrier = Arc::new(WaitGroup::new());
            barrier.add(1);
            let signal = Arc::clone(&barrier);
            pool.execute(move || signal.done()).expect("dispatch failed");
            barrier.wait();
            // The barrier fires before the worker re-enters the free list;
            // wait for the release so the next dispatch reuses it.
            assert!(eventually(|| pool.idle_workers() == 1, Duration::from_secs(2)));
        }

        // Sequential jobs never need more than one worker.
        assert_eq!(pool.active_workers(), 1);
        pool.shutdown().expect("shutdown failed");
    }

    #[test]
    fn test_free_list_stays_sorted_by_last_use() {
        let pool = small_pool(4);
        let gate = Arc::new(WaitGroup::new());
        gate.add(4);

        // Four concurrent tasks with staggered finishes release their
        // workers back to the free list at distinct times.
        for i in 0..4u64 {
            let gate = Arc::clone(&gate);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(10 * (i + 1)));
                gate.done();
            })
            .expect("dispatch failed");
        }
        gate.wait();
        assert!(eventually(|| pool.idle_workers() == 4, Duration::from_secs(2)));

        let inner = pool.core.inner.lock();
        let stamps: Vec<Instant> = inner.idle.iter().map(|w| w.last_used).collect();
        drop(inner);
        assert!(
            stamps.windows(2).all(|pair| pair[0] <= pair[1]),
            "free list not sorted ascending by last use"
        );

        pool.shutdown().expect("shutdown failed");
    }

    #[test]
    fn test_sweep_evicts_only_entries_past_the_cutoff() {
        let pool = Pool::with_config(
            PoolConfig::new()
                .with_max_workers(8)
                // Long interval: the sweep below is driven manually.
                .with_max_idle(Duration::from_millis(80)),
        )
        .expect("failed to create pool");

        // Fabricated free-list entries; receivers are kept to observe which
        // ones get the shutdown sentinel.
        let mut receivers = Vec::new();
        {
            let mut inner = pool.core.inner.lock();
            for _ in 0..3 {
                let (tx, rx) = bounded(1);
                receivers.push(rx);
                inner.idle.push_back(IdleWorker {
                    sender: tx,
                    last_used: Instant::now(),
                });
            }
        }
        thread::sleep(Duration::from_millis(120));
        {
            let mut inner = pool.core.inner.lock();
            for _ in 0..2 {
                let (tx, rx) = bounded(1);
                receivers.push(rx);
                inner.idle.push_back(IdleWorker {
                    sender: tx,
                    last_used: Instant::now(),
                });
            }
        }

        pool.core.sweep_idle();

        assert_eq!(pool.idle_workers(), 2);
        for rx in &receivers[..3] {
            assert!(
                matches!(rx.try_recv(), Ok(Directive::Shutdown)),
                "stale entry did not receive the shutdown sentinel"
            );
        }
        for rx in &receivers[3..] {
            assert!(rx.try_recv().is_err(), "fresh entry was evicted");
        }
    }

    #[test]
    fn test_active_count_never_exceeds_cap() {
        let pool = small_pool(3);
        let barrier = Arc::new(WaitGroup::new());
        let peak = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));

        barrier.add(12);
        for _ in 0..12 {
            let barrier = Arc::clone(&barrier);
            let peak = Arc::clone(&peak);
            let running = Arc::clone(&running);
            pool.execute(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                barrier.done();
            })
            .expect("dispatch failed");
            assert!(pool.active_workers() <= 3);
        }
        barrier.wait();

        assert!(peak.load(Ordering::SeqCst) <= 3);
        pool.shutdown().expect("shutdown failed");
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_new_work() {
        let pool = small_pool(2);
        pool.execute(|| {}).expect("dispatch failed");
        pool.shutdown().expect("shutdown failed");
        pool.shutdown().expect("second shutdown failed");

        assert!(pool.is_shutdown());
        assert_eq!(pool.active_workers(), 0);
        assert!(matches!(pool.execute(|| {}), Err(PoolError::ShuttingDown)));
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        assert!(matches!(
            Pool::with_config(PoolConfig::new().with_max_workers(0)),
            Err(PoolError::InvalidConfig { .. })
        ));
        assert!(matches!(
            Pool::with_config(PoolConfig::new().with_max_idle(Duration::ZERO)),
            Err(PoolError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_dropping_every_handle_stops_the_workers() {
        let pool = small_pool(2);
        let barrier = Arc::new(WaitGroup::new());
        barrier.add(1);
        let signal = Arc::clone(&barrier);
        pool.execute(move || signal.done()).expect("dispatch failed");
        barrier.wait();

        drop(pool);
        // Nothing to assert beyond "this returns": core teardown must not
        // deadlock on its own worker or scavenger threads.
    }
}
