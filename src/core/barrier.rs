//! Reusable completion barrier for batched jobs
//!
//! A [`WaitGroup`] counts pending jobs: one slot is acquired per submitted
//! job and released when the job settles. Waiters block until the count
//! reaches zero. Unlike a one-shot barrier, the group can be topped up again
//! after it drains, so a single instance serves successive batches.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use workcrew::WaitGroup;
//!
//! let group = Arc::new(WaitGroup::new());
//! group.add(2);
//! for _ in 0..2 {
//!     let group = Arc::clone(&group);
//!     thread::spawn(move || {
//!         // work
//!         group.done();
//!     });
//! }
//! group.wait();
//! assert_eq!(group.pending(), 0);
//! ```

use log::warn;
use parking_lot::{Condvar, Mutex};

/// A counting completion barrier, reusable across batches
pub struct WaitGroup {
    pending: Mutex<usize>,
    zero: Condvar,
}

impl WaitGroup {
    /// Create a new wait group with no pending slots
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(0),
            zero: Condvar::new(),
        }
    }

    /// Acquire `n` pending slots
    pub fn add(&self, n: usize) {
        *self.pending.lock() += n;
    }

    /// Release one pending slot, waking all waiters when the count drains
    ///
    /// Calling `done` without a matching `add` is logged and ignored rather
    /// than allowed to underflow the counter.
    pub fn done(&self) {
        let mut pending = self.pending.lock();
        match *pending {
            0 => warn!("wait group: done() called without a matching add()"),
            1 => {
                *pending = 0;
                self.zero.notify_all();
            }
            _ => *pending -= 1,
        }
    }

    /// Block until every acquired slot has been released
    ///
    /// Returns immediately when no slots are pending.
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        while *pending > 0 {
            self.zero.wait(&mut pending);
        }
    }

    /// Number of slots currently pending
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WaitGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitGroup")
            .field("pending", &self.pending())
            .finish()
    }
}
