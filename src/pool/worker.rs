//! Worker thread implementation
//!
//! Each worker owns a private delivery queue and runs one job at a time.
//! After finishing a job the worker hands itself back to the pool's free
//! list; it terminates when it receives the shutdown sentinel, when the pool
//! refuses the release because it is stopping, or when the pool core has
//! been dropped.

use crate::core::error::{panic_message, PoolError, Result};
use crate::core::Dispatch;
use crate::pool::worker_pool::PoolCore;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Weak;
use std::thread;
use std::time::Instant;

/// Message delivered to a worker's private queue
pub(crate) enum Directive {
    /// Execute the dispatched job
    Run(Dispatch),
    /// Shutdown sentinel: exit the run loop
    Shutdown,
}

/// Free-list entry for a worker that is parked waiting for work
///
/// The pool appends these at the tail with a fresh timestamp and pops from
/// the head, which keeps the free list sorted ascending by `last_used`.
pub(crate) struct IdleWorker {
    pub(crate) sender: Sender<Directive>,
    pub(crate) last_used: Instant,
}

/// A pooled execution unit bound to a private delivery queue
pub(crate) struct Worker {
    id: usize,
    core: Weak<PoolCore>,
    sender: Sender<Directive>,
    receiver: Receiver<Directive>,
}

impl Worker {
    /// Spawn a worker thread and return the send side of its delivery queue.
    ///
    /// `queue_depth` of 0 creates a rendezvous queue: handing over a job
    /// blocks the dispatcher until the worker takes it.
    pub(crate) fn spawn(
        id: usize,
        queue_depth: usize,
        name_prefix: &str,
        core: Weak<PoolCore>,
    ) -> Result<Sender<Directive>> {
        let (sender, receiver) = bounded(queue_depth);
        let name = format!("{name_prefix}-{id}");
        let worker = Worker {
            id,
            core,
            sender: sender.clone(),
            receiver,
        };

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run())
            .map_err(|e| PoolError::spawn_with_source(name, "cannot create worker thread", e))?;

        Ok(sender)
    }

    /// Main worker loop, terminal on shutdown
    fn run(self) {
        debug!("worker {} started", self.id);

        loop {
            match self.receiver.recv() {
                Ok(Directive::Run(dispatch)) => {
                    self.execute(dispatch);

                    let Some(core) = self.core.upgrade() else {
                        break;
                    };
                    if !core.release(&self.sender) {
                        break;
                    }
                }
                Ok(Directive::Shutdown) | Err(_) => break,
            }
        }

        // Exit accounting runs on every path out of the loop. During pool
        // teardown the upgrade fails and the count no longer matters.
        if let Some(core) = self.core.upgrade() {
            core.worker_exited(self.id);
        }
        debug!("worker {} exited", self.id);
    }

    /// Execute one dispatched job behind a panic guard
    ///
    /// The dispatch settles its own job (outcome + barrier); the guard here
    /// only keeps the worker alive and its pool accounting intact if that
    /// settlement path itself faults.
    fn execute(&self, dispatch: Dispatch) {
        let job_id = dispatch.id();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(move || dispatch.run())) {
            error!(
                "worker {}: job {} panicked past its completion guard: {}",
                self.id,
                job_id,
                panic_message(payload.as_ref())
            );
        }
    }
}
