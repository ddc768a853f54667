//! Construct-once semantics of the process-wide shared pool
//!
//! Kept in its own test binary: the shared pool is per-process state, and a
//! single test exercises the whole sequence to avoid ordering races between
//! concurrently running tests.

use std::time::Duration;
use workcrew::{Pool, PoolConfig};

#[test]
fn first_construction_wins_and_later_options_are_ignored() {
    let first = Pool::global_with_config(
        PoolConfig::new()
            .with_max_workers(7)
            .with_max_idle(Duration::from_secs(120))
            .with_thread_name_prefix("shared"),
    )
    .expect("failed to build shared pool");
    assert_eq!(first.max_workers(), 7);
    assert_eq!(first.max_idle(), Duration::from_secs(120));

    // A second construction with different options silently keeps the
    // first call's configuration.
    let second = Pool::global_with_config(
        PoolConfig::new()
            .with_max_workers(99)
            .with_max_idle(Duration::from_secs(1)),
    )
    .expect("failed to fetch shared pool");
    assert_eq!(second.max_workers(), 7);
    assert_eq!(second.max_idle(), Duration::from_secs(120));

    // The bare accessor returns the same pool too.
    let third = Pool::global().expect("failed to fetch shared pool");
    assert_eq!(third.max_workers(), 7);

    // All handles drive the same workers.
    let mut crew = third.crew::<u32>();
    for i in 0..4u32 {
        crew.submit(move || Ok(i)).expect("submit failed");
    }
    let jobs = crew.join_all();
    assert_eq!(jobs.len(), 4);
    assert!(jobs.iter().all(|job| job.is_success()));
    assert!(first.active_workers() >= 1);
}
