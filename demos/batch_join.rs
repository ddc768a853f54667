//! Batch model: fan out many tasks, then join and aggregate the results.
//!
//! Run with: cargo run --example batch_join

use std::thread;
use std::time::{Duration, Instant};
use workcrew::prelude::*;

fn main() -> workcrew::Result<()> {
    env_logger::init();

    let pool = Pool::with_config(PoolConfig::new().with_max_workers(16))?;
    let mut crew = pool.crew::<usize>();

    let start = Instant::now();
    for page in 0..100usize {
        crew.submit(move || {
            // Stand-in for real work such as fetching and parsing a page.
            thread::sleep(Duration::from_millis(5));
            Ok(page * 2)
        })?;
    }

    let jobs = crew.join_all();
    let total: usize = jobs.iter().filter_map(|job| job.result().copied()).sum();
    let failures = jobs.iter().filter(|job| !job.is_success()).count();

    println!(
        "{} jobs in {:?}: total={total}, failures={failures}",
        jobs.len(),
        start.elapsed()
    );

    pool.shutdown()
}
