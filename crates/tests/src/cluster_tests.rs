//! Cluster routing through StaticCluster and the forward transport

use std::sync::Arc;
use std::time::Duration;

use backends::{MemoryStore, StaticCluster, UdpTransport};
use contracts::{stat, ClusterNode, ClusterRouter, ForwardEnvelope};
use director::DirectorBuilder;
use observability::MemoryStats;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::support::{clustered, config, point, specs, two_nodes, wait_until};

async fn next_envelope(outbound: &mut mpsc::Receiver<ForwardEnvelope>) -> ForwardEnvelope {
    timeout(Duration::from_secs(2), outbound.recv())
        .await
        .expect("no envelope in time")
        .expect("transport closed")
}

/// Remote ready owner: everything is forwarded once, nothing kept locally
#[tokio::test]
async fn test_remote_owner_receives_every_point() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.mem", vec!["b".to_string()]);
    let h = clustered(&cluster);
    let mut transport = cluster.take_transport().unwrap();

    h.submit_all((0..5).map(|i| point("host.mem", i, i as f64)))
        .await;

    for i in 0..5 {
        let envelope = next_envelope(&mut transport.outbound).await;
        assert_eq!(envelope.destination, "b");
        let forwarded = envelope.decode().unwrap();
        assert_eq!(forwarded.hops, 1);
        assert_eq!(forwarded.value, i as f64);
    }
    h.wait_settled(5).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.accepted, 0);
    assert_eq!(counters.forwarded, 5);
    assert_eq!(counters.dropped, 0);
    assert_eq!(h.stats.counter("receiver.forwarded_to.10_0_0_2_7946"), 5.0);
    assert_eq!(h.stats.counter(stat::DATAPOINTS_FORWARDED), 5.0);
    assert!(h.store.values("host.mem").is_empty());
    assert_eq!(h.store.persisted_count("host.mem"), 0);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_unready_owner_drops_points() {
    let cluster = two_nodes(false);
    cluster.pin_owner("host.mem", vec!["b".to_string()]);
    let h = clustered(&cluster);
    let mut transport = cluster.take_transport().unwrap();

    h.submit_all((0..5).map(|i| point("host.mem", i, i as f64)))
        .await;
    h.wait_settled(5).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.accepted, 0);
    assert_eq!(counters.forwarded, 0);
    assert_eq!(counters.dropped, 5);
    assert!(transport.outbound.try_recv().is_err());

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_replicated_series_is_applied_and_forwarded() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.cpu", vec!["a".to_string(), "b".to_string()]);
    let h = clustered(&cluster);
    let mut transport = cluster.take_transport().unwrap();

    h.submit_all((0..3).map(|i| point("host.cpu", i, 1.0))).await;
    for _ in 0..3 {
        next_envelope(&mut transport.outbound).await;
    }
    h.wait_settled(6).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.total, 3);
    assert_eq!(counters.accepted, 3);
    assert_eq!(counters.forwarded, 3);
    assert_eq!(h.store.values("host.cpu").len(), 3);

    h.handle.shutdown().await;
}

/// A replica receiving a forwarded point applies it and leaves the other
/// replicas to the sender
#[tokio::test]
async fn test_forwarded_point_on_replica_is_not_dropped() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.cpu", vec!["a".to_string(), "b".to_string()]);
    let h = clustered(&cluster);
    let mut transport = cluster.take_transport().unwrap();

    let mut replicated = point("host.cpu", 0, 1.0);
    replicated.hops = 1;
    let envelope = ForwardEnvelope::encode(&cluster.local_node(), &replicated).unwrap();
    transport.inbound.send(envelope).await.unwrap();

    let counters = Arc::clone(h.handle.counters());
    wait_until("forwarded point applied", || counters.accepted() == 1).await;

    // Submitted after, so its settling orders behind the replicated point.
    h.submit_all([point("host.cpu", 1, 2.0)]).await;
    let sent = next_envelope(&mut transport.outbound).await;
    assert_eq!(sent.decode().unwrap().value, 2.0);
    h.wait_settled(3).await;

    let counters = h.handle.counters().snapshot();
    assert_eq!(counters.total, 2);
    assert_eq!(counters.accepted, 2);
    assert_eq!(counters.forwarded, 1);
    assert_eq!(counters.dropped, 0);
    assert_eq!(h.stats.counter(stat::DATAPOINTS_DROPPED), 0.0);
    assert!(transport.outbound.try_recv().is_err());

    h.handle.shutdown().await;
}

/// Ownership moving away discards unsaved local state for the series
#[tokio::test]
async fn test_ownership_move_clears_unsaved_points() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.cpu", vec!["a".to_string()]);
    let h = clustered(&cluster);
    let mut transport = cluster.take_transport().unwrap();
    let counters = Arc::clone(h.handle.counters());

    h.store.pause();
    h.submit_all((0..2).map(|i| point("host.cpu", i, i as f64)))
        .await;
    wait_until("local points applied", || counters.accepted() == 2).await;
    assert_eq!(h.store.persisted_count("host.cpu"), 0);

    cluster.pin_owner("host.cpu", vec!["b".to_string()]);
    h.submit_all([point("host.cpu", 2, 2.0)]).await;
    let envelope = next_envelope(&mut transport.outbound).await;
    assert_eq!(envelope.destination, "b");
    wait_until("point forwarded", || counters.forwarded() == 1).await;

    h.store.resume();
    cluster.pin_owner("host.cpu", vec!["a".to_string()]);
    h.submit_all([point("host.cpu", 3, 3.0)]).await;
    wait_until("point accepted after move back", || counters.accepted() == 3).await;

    let store = Arc::clone(&h.store);
    wait_until("flush after resume", || store.persisted_count("host.cpu") == 1).await;
    let snapshot = counters.snapshot();
    assert_eq!(snapshot.forwarded, 1);
    assert_eq!(snapshot.dropped, 0);

    h.handle.shutdown().await;
    assert_eq!(h.store.persisted_count("host.cpu"), 1);
}

/// Points forwarded to us are applied here and never forwarded again
#[tokio::test]
async fn test_forwarded_points_are_applied_or_dropped() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.cpu", vec!["a".to_string()]);
    cluster.pin_owner("host.mem", vec!["b".to_string()]);
    let h = clustered(&cluster);
    let mut transport = cluster.take_transport().unwrap();
    let local = cluster.local_node();

    let mut owned = point("host.cpu", 0, 1.0);
    owned.hops = 1;
    let mut stray = point("host.mem", 0, 2.0);
    stray.hops = 1;
    let mut looping = point("host.cpu", 1, 3.0);
    looping.hops = 3;

    for p in [&owned, &stray, &looping] {
        let envelope = ForwardEnvelope::encode(&local, p).unwrap();
        transport.inbound.send(envelope).await.unwrap();
    }
    transport
        .inbound
        .send(ForwardEnvelope {
            destination: "a".to_string(),
            body: vec![0xff, 0x01].into(),
        })
        .await
        .unwrap();
    h.wait_settled(2).await;

    let counters = h.handle.counters().snapshot();
    // The looping point and the garbage never reach the loop.
    assert_eq!(counters.total, 2);
    assert_eq!(counters.accepted, 1);
    assert_eq!(counters.dropped, 1);
    assert_eq!(counters.forwarded, 0);
    assert_eq!(h.store.values("host.cpu"), vec![1.0]);
    assert!(transport.outbound.try_recv().is_err());

    h.handle.shutdown().await;
}

/// Unknown cluster state keeps points buffered until owners are known
#[tokio::test]
async fn test_unknown_ownership_buffers_points() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.cpu", vec!["a".to_string()]);
    cluster.set_state_known(false);
    let h = clustered(&cluster);

    h.submit_all((0..4).map(|i| point("host.cpu", i, i as f64)))
        .await;
    let store = Arc::clone(&h.store);
    wait_until("record created", || store.created_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.handle.counters().snapshot().settled(), 0);

    cluster.set_state_known(true);
    h.submit_all([point("host.cpu", 4, 4.0)]).await;
    h.wait_settled(5).await;

    assert_eq!(h.handle.counters().accepted(), 5);
    assert_eq!(h.store.values("host.cpu"), vec![0.0, 1.0, 2.0, 3.0, 4.0]);

    h.handle.shutdown().await;
}

#[tokio::test]
async fn test_rebalance_timeout_is_not_fatal() {
    let cluster = two_nodes(true);
    cluster.pin_owner("host.cpu", vec!["a".to_string()]);
    cluster.set_rebalance_delay(Duration::from_secs(30));

    let mut director_config = config();
    director_config.rebalance_timeout = Duration::from_millis(20);
    let store = Arc::new(MemoryStore::new());
    let handle = DirectorBuilder::new(
        director_config,
        specs(),
        Arc::clone(&store),
        Arc::new(MemoryStats::new()),
    )
    .with_cluster(Arc::clone(&cluster))
    .start()
    .unwrap();

    cluster.add_node(ClusterNode::new("c", "10.0.0.3:7946", true));
    let sender = handle.sender();
    sender.submit(point("host.cpu", 0, 1.0)).await.unwrap();

    let counters = Arc::clone(handle.counters());
    wait_until("point accepted after rebalance", || counters.accepted() == 1).await;
    assert_eq!(cluster.rebalance_count(), 0);

    cluster.set_rebalance_delay(Duration::ZERO);
    cluster.remove_node("c");
    wait_until("rebalance", || cluster.rebalance_count() == 1).await;

    handle.shutdown().await;
}

#[tokio::test]
async fn test_readiness_follows_director_lifecycle() {
    let cluster = two_nodes(true);
    assert!(!cluster.is_local_ready());

    let h = clustered(&cluster);
    assert!(cluster.is_local_ready());
    assert!(cluster.register_forward_channel().is_err());

    h.handle.shutdown().await;
    assert!(!cluster.is_local_ready());
}

/// Two receivers connected over UDP on loopback
#[tokio::test]
async fn test_points_cross_udp_transport() {
    let port_a = reserve_port();
    let port_b = reserve_port();
    let addr_a = format!("127.0.0.1:{port_a}");
    let addr_b = format!("127.0.0.1:{port_b}");

    let nodes = |local: &str| {
        let cluster = StaticCluster::new(
            local,
            vec![
                ClusterNode::new("a", &addr_a, true),
                ClusterNode::new("b", &addr_b, true),
            ],
        );
        cluster.pin_owner("host.net", vec!["b".to_string()]);
        Arc::new(cluster)
    };
    let cluster_a = nodes("a");
    let cluster_b = nodes("b");

    let a = clustered(&cluster_a);
    let b = clustered(&cluster_b);

    let udp_a = UdpTransport::start(
        &addr_a,
        &[ClusterNode::new("b", &addr_b, true)],
        cluster_a.take_transport().unwrap(),
    )
    .await
    .unwrap();
    let udp_b = UdpTransport::start(
        &addr_b,
        &[ClusterNode::new("a", &addr_a, true)],
        cluster_b.take_transport().unwrap(),
    )
    .await
    .unwrap();

    a.submit_all((0..10).map(|i| point("host.net", i, i as f64)))
        .await;
    a.wait_settled(10).await;
    b.wait_settled(10).await;

    assert_eq!(a.handle.counters().forwarded(), 10);
    assert!(a.store.values("host.net").is_empty());
    assert_eq!(b.handle.counters().accepted(), 10);
    assert_eq!(b.store.values("host.net").len(), 10);

    a.handle.shutdown().await;
    b.handle.shutdown().await;
    udp_a.shutdown();
    udp_b.shutdown();
}

fn reserve_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}
