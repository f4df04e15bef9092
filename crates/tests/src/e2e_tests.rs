//! Standalone receiver: no clustering

use std::sync::Arc;

use backends::MemoryStore;
use contracts::stat;
use director::{DirectorError, DirectorState};

use crate::support::{config, point, standalone, wait_until};

/// Ten points for a new identifier: one created record, ten applied
#[tokio::test]
async fn test_new_series_is_created_once_and_applied() {
    let h = standalone(config(), MemoryStore::new());

    h.submit_all((0..10).map(|i| point("host.cpu", i * 10, i as f64)))
        .await;
    h.wait_settled(10).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.accepted, 10);
    assert_eq!(counters.created, 1);
    assert_eq!(counters.dropped, 0);
    assert_eq!(h.stats.counter(stat::CREATED), 1.0);
    assert_eq!(h.stats.counter(stat::DATAPOINTS_ACCEPTED), 10.0);
    assert_eq!(h.stats.counter(stat::DATAPOINTS_TOTAL), 10.0);
    assert_eq!(h.store.created_count(), 1);
    assert_eq!(h.store.values("host.cpu").len(), 10);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_single_producer_order_is_preserved() {
    let h = standalone(config(), MemoryStore::new());

    let expected: Vec<f64> = (0..200).map(f64::from).collect();
    h.submit_all(
        expected
            .iter()
            .enumerate()
            .map(|(i, v)| point("host.disk", i as i64, *v)),
    )
    .await;
    h.wait_settled(200).await;

    assert_eq!(h.store.values("host.disk"), expected);
    assert_eq!(h.handle.counters().dropped(), 0);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_identifier_is_dropped_without_record() {
    let h = standalone(config(), MemoryStore::new());

    h.submit_all([point("db.queries", 0, 1.0), point("host.cpu", 0, 1.0)])
        .await;
    h.wait_settled(2).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.dropped, 1);
    assert_eq!(counters.accepted, 1);
    assert_eq!(h.store.record_count(), 1);
    assert_eq!(h.store.id_of("db.queries"), None);
    assert_eq!(h.stats.counter(stat::DATAPOINTS_DROPPED), 1.0);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_nan_is_skipped_not_dropped() {
    let h = standalone(config(), MemoryStore::new());

    h.submit_all([point("host.cpu", 0, f64::NAN), point("host.cpu", 10, 2.0)])
        .await;
    h.wait_settled(2).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.total, 2);
    assert_eq!(counters.nan_skipped, 1);
    assert_eq!(counters.dropped, 0);
    assert_eq!(h.stats.counter(stat::DATAPOINTS_DROPPED), 0.0);
    assert_eq!(h.store.values("host.cpu"), vec![2.0]);

    h.handle.shutdown().await;
}

/// Many producers hitting a new identifier at once still create it once
#[tokio::test]
async fn test_concurrent_first_arrival_creates_once() {
    let h = standalone(config(), MemoryStore::new());

    let mut producers = Vec::new();
    for producer in 0..8 {
        let sender = h.handle.sender();
        producers.push(tokio::spawn(async move {
            for _ in 0..25 {
                // Same timestamp everywhere: interleaving never goes backwards.
                sender
                    .submit(point("host.net", 0, producer as f64))
                    .await
                    .unwrap();
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    h.wait_settled(200).await;

    assert_eq!(h.store.created_count(), 1);
    assert_eq!(h.store.fetch_count(), 1);
    assert_eq!(h.handle.counters().accepted(), 200);
    assert_eq!(h.store.values("host.net").len(), 200);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_out_of_order_point_is_rejected_by_storage() {
    let h = standalone(config(), MemoryStore::new());

    h.submit_all([
        point("host.cpu", 100, 1.0),
        point("host.cpu", 50, 2.0),
        point("host.cpu", 150, 3.0),
    ])
    .await;
    h.wait_settled(3).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.accepted, 2);
    assert_eq!(counters.dropped, 1);
    assert_eq!(h.store.values("host.cpu"), vec![1.0, 3.0]);

    h.handle.shutdown().await;
}

/// A failed load keeps the buffered points for the next attempt
#[tokio::test]
async fn test_failed_load_is_retried_on_next_point() {
    let store = MemoryStore::new();
    store.fail_ident("host.cpu");
    let h = standalone(config(), store);

    h.submit_all([point("host.cpu", 0, 0.0)]).await;
    let store = Arc::clone(&h.store);
    wait_until("first load attempt", || store.fetch_count() >= 1).await;
    h.store.clear_failures();

    let counters = Arc::clone(h.handle.counters());
    let mut submitted = 1;
    while counters.accepted() == 0 {
        assert!(submitted < 100, "load was never retried");
        h.submit_all([point("host.cpu", submitted, submitted as f64)])
            .await;
        submitted += 1;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    h.wait_settled(submitted as u64).await;

    assert_eq!(counters.accepted(), submitted as u64);
    assert_eq!(counters.dropped(), 0);
    assert_eq!(h.store.created_count(), 1);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_accounts_for_series_that_never_loaded() {
    let store = MemoryStore::new();
    store.fail_ident("host.cpu");
    let h = standalone(config(), store);

    h.submit_all((0..3).map(|i| point("host.cpu", i, 1.0))).await;
    let counters = Arc::clone(h.handle.counters());
    let mut states = h.handle.state_changes();
    let sender = h.handle.sender();

    h.handle.shutdown().await;

    let snapshot = counters.snapshot();
    assert_eq!(snapshot.total, 3);
    assert_eq!(snapshot.dropped, 3);
    assert_eq!(snapshot.settled(), 3);
    assert_eq!(*states.borrow_and_update(), DirectorState::Stopped);
    assert!(matches!(
        sender.try_submit(point("host.cpu", 10, 1.0)),
        Err(DirectorError::InboundClosed)
    ));
}

#[tokio::test]
async fn test_shutdown_drains_accepted_points() {
    let h = standalone(config(), MemoryStore::new());
    wait_until("running", || h.handle.state() == DirectorState::Running).await;

    h.submit_all((0..50).map(|i| point("host.cpu", i, i as f64)))
        .await;
    let counters = Arc::clone(h.handle.counters());
    h.handle.shutdown().await;

    assert_eq!(counters.accepted(), 50);
    assert_eq!(h.store.values("host.cpu").len(), 50);
}
