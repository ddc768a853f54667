//! # workcrew
//!
//! A reusable worker pool: a bounded set of worker threads that run
//! submitted tasks concurrently, with idle workers reclaimed by a background
//! scavenger after a configurable timeout.
//!
//! ## Features
//!
//! - **Lazy workers**: threads are spawned on demand up to a configurable
//!   cap and reused in least-recently-used-first order
//! - **Backpressure**: dispatch blocks while the pool is saturated, with
//!   optional timeouts for callers that cannot wait indefinitely
//! - **Idle eviction**: a scavenger sweeps the free list and retires workers
//!   idle past the configured threshold
//! - **Batched results**: a [`Crew`] aggregates submitted jobs and joins
//!   them as a batch, returning handles in submission order
//! - **Fault isolation**: a panicking task fails its job, never its worker
//!   or the pool's accounting
//!
//! ## Quick Start
//!
//! ```rust
//! use workcrew::prelude::*;
//!
//! # fn main() -> workcrew::Result<()> {
//! let pool = Pool::with_config(PoolConfig::new().with_max_workers(4))?;
//! let mut crew = pool.crew::<u32>();
//!
//! for i in 0..10u32 {
//!     crew.submit(move || Ok(i * 2))?;
//! }
//!
//! // Jobs come back in submission order, whatever order they finished in.
//! let jobs = crew.join_all();
//! assert_eq!(jobs.len(), 10);
//! assert_eq!(jobs[3].result(), Some(&6));
//!
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Per-job access
//!
//! Each [`submit`](Crew::submit) returns a [`Job`] handle whose accessors
//! block until the batch completes and are idempotent afterwards:
//!
//! ```rust
//! use workcrew::prelude::*;
//!
//! # fn main() -> workcrew::Result<()> {
//! let pool = Pool::with_config(PoolConfig::new().with_max_workers(2))?;
//! let mut crew = pool.crew::<u32>();
//!
//! let job = crew.submit(|| Ok(21 * 2))?;
//! assert!(job.is_success());
//! assert_eq!(job.result(), Some(&42));
//!
//! let failing = crew.submit(|| Err(PoolError::other("no luck")))?;
//! assert!(!failing.is_success());
//! assert!(failing.error().is_some());
//! # pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Shared pool
//!
//! [`Pool::global_with_config`] builds a process-wide pool on first call;
//! later calls return the same pool and silently ignore their options, a
//! deliberately preserved quirk of the interface. Prefer explicit
//! [`Pool::with_config`] instances where you can inject them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod crew;
pub mod pool;
pub mod prelude;

pub use crate::core::{Job, PoolError, Result, WaitGroup};
pub use crate::crew::Crew;
pub use crate::pool::{Pool, PoolConfig, DEFAULT_MAX_IDLE, DEFAULT_MAX_WORKERS};
