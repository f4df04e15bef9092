//! StaticCluster - in-process cluster router over a configured node list
//!
//! Ownership is decided by rendezvous hashing of identifier and node name,
//! so every node configured with the same list agrees on the owners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    ClusterConfig, ClusterNode, ClusterRouter, ContractError, DistributedDatum, ForwardChannel,
    ForwardEnvelope,
};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use xxhash_rust::xxh64::xxh64;

const DEFAULT_FORWARD_CAPACITY: usize = 1024;

/// Transport ends of the forward channel
///
/// `outbound` yields envelopes the Director wants delivered; envelopes sent
/// on `inbound` reach the Director as forwarded points.
#[derive(Debug)]
pub struct ClusterTransport {
    pub outbound: mpsc::Receiver<ForwardEnvelope>,
    pub inbound: mpsc::Sender<ForwardEnvelope>,
}

#[derive(Debug)]
struct Membership {
    nodes: Vec<ClusterNode>,
    pinned: HashMap<String, Vec<String>>,
    known: bool,
}

/// Static cluster router
#[derive(Debug)]
pub struct StaticCluster {
    local: String,
    replication: usize,
    forward_capacity: usize,
    membership: Mutex<Membership>,
    watchers: Mutex<Vec<mpsc::Sender<()>>>,
    transport: Mutex<Option<ClusterTransport>>,
    registered: Mutex<bool>,
    rebalance_delay: Mutex<Duration>,
    rebalances: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Rendezvous weight of `node` for `ident`
///
/// XXH64 with seed 0. The output must not depend on the toolchain: every node
/// ranks owners on its own, and std's `DefaultHasher` may change between
/// Rust releases.
fn score(ident: &str, node: &str) -> u64 {
    let mut key = Vec::with_capacity(ident.len() + node.len() + 1);
    key.extend_from_slice(ident.as_bytes());
    key.push(0);
    key.extend_from_slice(node.as_bytes());
    xxh64(&key, 0)
}

impl StaticCluster {
    /// Create a router for `local` over `nodes`
    ///
    /// The local node starts not ready; the Director marks it ready on start.
    pub fn new(local: impl Into<String>, nodes: impl IntoIterator<Item = ClusterNode>) -> Self {
        let local = local.into();
        let nodes = nodes
            .into_iter()
            .map(|node| {
                if node.name() == local {
                    ClusterNode::new(node.name(), node.addr(), false)
                } else {
                    node
                }
            })
            .collect();

        Self {
            local,
            replication: 1,
            forward_capacity: DEFAULT_FORWARD_CAPACITY,
            membership: Mutex::new(Membership {
                nodes,
                pinned: HashMap::new(),
                known: true,
            }),
            watchers: Mutex::new(Vec::new()),
            transport: Mutex::new(None),
            registered: Mutex::new(false),
            rebalance_delay: Mutex::new(Duration::ZERO),
            rebalances: AtomicU64::new(0),
        }
    }

    /// Build from configuration; remote nodes are assumed ready
    pub fn from_config(config: &ClusterConfig) -> Self {
        let nodes = config
            .nodes
            .iter()
            .map(|node| ClusterNode::new(&node.name, &node.addr, true));
        Self::new(&config.local_node, nodes).with_replication(config.replication)
    }

    pub fn with_replication(mut self, replication: usize) -> Self {
        self.replication = replication.max(1);
        self
    }

    pub fn with_forward_capacity(mut self, capacity: usize) -> Self {
        self.forward_capacity = capacity.max(1);
        self
    }

    /// Force the owners of `ident`, in order
    pub fn pin_owner(&self, ident: impl Into<String>, owners: Vec<String>) {
        lock(&self.membership).pinned.insert(ident.into(), owners);
    }

    pub fn set_node_ready(&self, name: &str, ready: bool) {
        let mut membership = lock(&self.membership);
        if let Some(node) = membership.nodes.iter_mut().find(|n| n.name() == name) {
            *node = ClusterNode::new(node.name(), node.addr(), ready);
        }
    }

    /// Toggle whether ownership can be computed at all
    pub fn set_state_known(&self, known: bool) {
        lock(&self.membership).known = known;
    }

    pub fn add_node(&self, node: ClusterNode) {
        info!(node = %node.name(), addr = %node.addr(), "Node joined");
        {
            let mut membership = lock(&self.membership);
            membership.nodes.retain(|n| n.name() != node.name());
            membership.nodes.push(node);
        }
        self.notify_change();
    }

    pub fn remove_node(&self, name: &str) {
        info!(node = %name, "Node left");
        lock(&self.membership).nodes.retain(|n| n.name() != name);
        self.notify_change();
    }

    pub fn nodes(&self) -> Vec<ClusterNode> {
        lock(&self.membership).nodes.clone()
    }

    /// Look a node up by name
    pub fn node(&self, name: &str) -> Option<ClusterNode> {
        lock(&self.membership)
            .nodes
            .iter()
            .find(|n| n.name() == name)
            .cloned()
    }

    pub fn set_rebalance_delay(&self, delay: Duration) {
        *lock(&self.rebalance_delay) = delay;
    }

    /// Completed rebalances
    pub fn rebalance_count(&self) -> u64 {
        self.rebalances.load(Ordering::Relaxed)
    }

    pub fn is_local_ready(&self) -> bool {
        self.node(&self.local).is_some_and(|n| n.ready())
    }

    /// Take the transport ends of the registered forward channel (only once)
    pub fn take_transport(&self) -> Option<ClusterTransport> {
        lock(&self.transport).take()
    }

    fn notify_change(&self) {
        lock(&self.watchers).retain(|tx| match tx.try_send(()) {
            // A pending notification already covers this change.
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        });
    }
}

impl ClusterRouter for StaticCluster {
    fn owners_of(&self, datum: &DistributedDatum<'_>) -> Vec<ClusterNode> {
        let membership = lock(&self.membership);
        if !membership.known {
            return Vec::new();
        }

        if let Some(pinned) = membership.pinned.get(datum.key()) {
            return pinned
                .iter()
                .filter_map(|name| membership.nodes.iter().find(|n| n.name() == name))
                .cloned()
                .collect();
        }

        let mut ranked: Vec<_> = membership
            .nodes
            .iter()
            .map(|node| (score(datum.key(), node.name()), node))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name().cmp(b.1.name())));
        ranked
            .into_iter()
            .take(self.replication)
            .map(|(_, node)| node.clone())
            .collect()
    }

    fn local_node(&self) -> ClusterNode {
        self.node(&self.local)
            .unwrap_or_else(|| ClusterNode::new(&self.local, "", false))
    }

    fn register_forward_channel(&self) -> Result<ForwardChannel, ContractError> {
        let mut registered = lock(&self.registered);
        if *registered {
            return Err(ContractError::forward_channel(
                "forward channel already registered",
            ));
        }
        *registered = true;

        let (out_tx, out_rx) = mpsc::channel(self.forward_capacity);
        let (in_tx, in_rx) = mpsc::channel(self.forward_capacity);
        *lock(&self.transport) = Some(ClusterTransport {
            outbound: out_rx,
            inbound: in_tx,
        });
        debug!(capacity = self.forward_capacity, "Forward channel registered");

        Ok(ForwardChannel {
            tx: out_tx,
            rx: in_rx,
        })
    }

    fn membership_changes(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        lock(&self.watchers).push(tx);
        rx
    }

    #[instrument(name = "static_cluster_rebalance", skip(self))]
    async fn rebalance(&self, timeout: Duration) -> Result<(), ContractError> {
        let delay = *lock(&self.rebalance_delay);
        if delay > timeout {
            tokio::time::sleep(timeout).await;
            warn!(delay_ms = delay.as_millis() as u64, "Rebalance exceeded its timeout");
            return Err(ContractError::RebalanceTimeout {
                waited_ms: timeout.as_millis() as u64,
            });
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.rebalances.fetch_add(1, Ordering::Relaxed);
        debug!(nodes = lock(&self.membership).nodes.len(), "Ownership recomputed");
        Ok(())
    }

    fn mark_ready(&self, ready: bool) {
        self.set_node_ready(&self.local, ready);
        info!(node = %self.local, ready, "Local readiness changed");
    }
}
