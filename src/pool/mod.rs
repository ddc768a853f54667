//! Worker pool and worker implementation

pub mod worker;
pub mod worker_pool;

pub use worker_pool::{Pool, PoolConfig, DEFAULT_MAX_IDLE, DEFAULT_MAX_WORKERS};
