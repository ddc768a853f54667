//! Basic usage: submit tasks and inspect each job as it is needed.
//!
//! Run with: cargo run --example basic_usage

use std::time::Duration;
use workcrew::prelude::*;

fn main() -> workcrew::Result<()> {
    env_logger::init();

    let pool = Pool::with_config(
        PoolConfig::new()
            .with_max_workers(4)
            .with_max_idle(Duration::from_secs(30)),
    )?;

    let mut crew = pool.crew::<u64>();

    for i in 1..=8u64 {
        crew.submit(move || {
            if i % 5 == 0 {
                return Err(PoolError::other(format!("input {i} is not supported")));
            }
            Ok(i * i)
        })?;
    }

    // Accessing a job blocks until the whole batch has finished.
    for job in crew.join_all() {
        if job.is_success() {
            println!("job {} -> {:?}", job.id(), job.result());
        } else {
            println!("job {} failed: {:?}", job.id(), job.error());
        }
    }

    println!(
        "pool: {} active worker(s), {} idle",
        pool.active_workers(),
        pool.idle_workers()
    );

    pool.shutdown()
}
