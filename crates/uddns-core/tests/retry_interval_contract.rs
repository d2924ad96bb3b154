//! Contract Test: Retry Interval
//!
//! This test verifies the scheduling policy of the polling loop.
//!
//! Constraints verified:
//! - A successful cycle is followed by the full interval
//! - A failed cycle is followed by the shortened error interval
//! - Failures never stop the loop
//! - Without a configured error interval, a quarter of the interval is used
//!
//! If this test fails, retry timing has drifted.

mod common;

use common::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uddns_core::SyncEngine;

async fn run_for(engine: SyncEngine, duration: Duration) {
    let mut engine = engine;
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel).await }
    });

    tokio::time::sleep(duration).await;
    cancel.cancel();
    handle.await.expect("engine task should not panic");
}

#[tokio::test(start_paused = true)]
async fn failure_shortens_next_sleep() {
    let registrar = MockRegistrar::new("1.2.3.4").with_record("id1", "1.2.3.4");
    registrar.fail_next(Step::CurrentIp, timeout_error());
    let sink = RecordingSink::new();
    let engine = SyncEngine::new(mock_config(), registrar.registry(), sink.clone()).unwrap();

    // Failure at 0, success at 5m, next cycle at 25m.
    run_for(engine, Duration::from_secs(26 * 60)).await;

    let queries = registrar.ip_queries();
    assert_eq!(queries.len(), 3, "{:?}", queries);
    assert_eq!(queries[1] - queries[0], Duration::from_secs(5 * 60));
    assert_eq!(queries[2] - queries[1], Duration::from_secs(20 * 60));
    assert_eq!(sink.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_keep_the_loop_alive() {
    let registrar = MockRegistrar::new("1.2.3.4");
    for _ in 0..3 {
        registrar.fail_next(Step::Authenticate, timeout_error());
    }
    let sink = RecordingSink::new();
    let engine = SyncEngine::new(mock_config(), registrar.registry(), sink.clone()).unwrap();

    run_for(engine, Duration::from_secs(16 * 60)).await;

    assert_eq!(registrar.ip_queries().len(), 4);
    assert_eq!(sink.errors().len(), 3);
    assert_eq!(registrar.records().len(), 1, "fourth cycle creates the record");
}

#[tokio::test(start_paused = true)]
async fn default_error_interval_is_a_quarter() {
    let registrar = MockRegistrar::new("1.2.3.4");
    registrar.fail_next(Step::CurrentIp, timeout_error());
    let sink = RecordingSink::new();
    let config = mock_config().with_intervals(20, None);
    let engine = SyncEngine::new(config, registrar.registry(), sink).unwrap();

    run_for(engine, Duration::from_secs(6 * 60)).await;

    let queries = registrar.ip_queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[1] - queries[0], Duration::from_secs(5 * 60));
}
