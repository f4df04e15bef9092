//! Shared fixtures for the scenario tests

use std::sync::Arc;
use std::time::Duration;

use backends::{MemoryRecord, MemoryStore, StaticCluster};
use chrono::{TimeZone, Utc};
use contracts::{ClusterNode, IncomingPoint, SeriesSpec};
use director::{DirectorBuilder, DirectorConfig, DirectorHandle};
use observability::MemoryStats;
use tokio::time::Instant;

pub const BASE_TS: i64 = 1_700_000_000;

pub fn config() -> DirectorConfig {
    DirectorConfig {
        channel_capacity: 16,
        flush_threshold: 256,
        rebalance_timeout: Duration::from_secs(1),
        report_interval: Duration::from_millis(20),
    }
}

pub fn specs() -> Vec<SeriesSpec> {
    vec![SeriesSpec {
        pattern: r"^host\.".to_string(),
        step_secs: 10,
        heartbeat_secs: 120,
        archives: Vec::new(),
    }]
}

pub fn point(ident: &str, offset: i64, value: f64) -> IncomingPoint {
    IncomingPoint::new(
        ident,
        Utc.timestamp_opt(BASE_TS + offset, 0).unwrap(),
        value,
    )
}

/// Node "a" is local, node "b" remote
pub fn two_nodes(b_ready: bool) -> Arc<StaticCluster> {
    Arc::new(StaticCluster::new(
        "a",
        vec![
            ClusterNode::new("a", "10.0.0.1:7946", true),
            ClusterNode::new("b", "10.0.0.2:7946", b_ready),
        ],
    ))
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub stats: Arc<MemoryStats>,
    pub handle: DirectorHandle<MemoryRecord>,
}

pub fn standalone(config: DirectorConfig, store: MemoryStore) -> Harness {
    let store = Arc::new(store);
    let stats = Arc::new(MemoryStats::new());
    let handle = DirectorBuilder::new(config, specs(), Arc::clone(&store), stats.clone())
        .start()
        .unwrap();
    Harness {
        store,
        stats,
        handle,
    }
}

pub fn clustered(cluster: &Arc<StaticCluster>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(MemoryStats::new());
    let handle = DirectorBuilder::new(config(), specs(), Arc::clone(&store), stats.clone())
        .with_cluster(Arc::clone(cluster))
        .start()
        .unwrap();
    Harness {
        store,
        stats,
        handle,
    }
}

/// Poll `check` until it holds, failing after five seconds
pub async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

impl Harness {
    pub async fn submit_all(&self, points: impl IntoIterator<Item = IncomingPoint>) {
        let sender = self.handle.sender();
        for point in points {
            sender.submit(point).await.unwrap();
        }
    }

    /// Wait until `count` points have a settled fate
    pub async fn wait_settled(&self, count: u64) {
        let counters = Arc::clone(self.handle.counters());
        wait_until("settled points", || counters.snapshot().settled() >= count).await;
    }
}
