//! Slow storage: the loop stalls, the inbound relay absorbs the overrun

use std::sync::Arc;
use std::time::Duration;

use backends::MemoryStore;
use contracts::stat;
use director::DirectorConfig;

use crate::support::{config, point, standalone, wait_until};

fn stall_config() -> DirectorConfig {
    DirectorConfig {
        channel_capacity: 4,
        flush_threshold: 4,
        report_interval: Duration::from_millis(10),
        ..config()
    }
}

#[tokio::test]
async fn test_queue_grows_during_stall_and_drains_after() {
    let store = MemoryStore::new();
    store.pause();
    let h = standalone(stall_config(), store);

    // Enough points to cross the flush threshold and block the loop.
    h.submit_all((0..10).map(|i| point("host.cpu", i, i as f64)))
        .await;
    let store = Arc::clone(&h.store);
    wait_until("loop blocked in flush", || store.values("host.cpu").len() >= 5).await;

    h.submit_all((10..50).map(|i| point("host.cpu", i, i as f64)))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let first = h.handle.queue_len();

    h.submit_all((50..90).map(|i| point("host.cpu", i, i as f64)))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h.handle.queue_len();

    assert!(first > 0, "queue should hold the overrun");
    assert!(second > first, "queue should keep growing: {first} -> {second}");
    let reported = h.stats.gauge_history(stat::QUEUE_LEN);
    assert!(
        reported.iter().any(|len| *len >= first as f64),
        "reporter never saw the backlog: {reported:?}"
    );

    h.store.resume();
    h.wait_settled(90).await;
    let stats = Arc::clone(&h.stats);
    wait_until("queue gauge back to zero", || {
        stats.last_gauge(stat::QUEUE_LEN) == Some(0.0)
    })
    .await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.total, 90);
    assert_eq!(counters.accepted, 90);
    assert_eq!(counters.dropped, 0);
    assert_eq!(h.handle.queue_len(), 0);
    assert_eq!(h.store.persisted_count("host.cpu"), 90);

    h.handle.shutdown().await;
}

/// Shutdown while storage is stalled still accounts for every point
#[tokio::test]
async fn test_shutdown_during_stall_loses_nothing() {
    let store = MemoryStore::new();
    store.pause();
    let h = standalone(stall_config(), store);

    h.submit_all((0..30).map(|i| point("host.cpu", i, 1.0))).await;
    let store = Arc::clone(&h.store);
    wait_until("loop blocked in flush", || store.values("host.cpu").len() >= 5).await;

    let counters = Arc::clone(h.handle.counters());
    let shutdown = tokio::spawn(h.handle.shutdown());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!shutdown.is_finished());

    h.store.resume();
    shutdown.await.unwrap();

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.total, 30);
    assert_eq!(snapshot.settled(), 30);
    assert_eq!(snapshot.accepted, 30);
}
