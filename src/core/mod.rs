//! Core types for the worker pool: errors, job handles, and the
//! completion barrier

pub mod barrier;
pub mod error;
pub mod job;

pub use barrier::WaitGroup;
pub use error::{PoolError, Result};
pub use job::Job;

pub(crate) use job::Dispatch;
