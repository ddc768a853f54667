//! Convenient re-exports for common types

pub use crate::core::{Job, PoolError, Result, WaitGroup};
pub use crate::crew::Crew;
pub use crate::pool::{Pool, PoolConfig};
