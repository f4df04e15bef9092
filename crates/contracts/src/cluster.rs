//! ClusterRouter trait - cluster membership interface consumed by the receiver
//!
//! Membership, consistent hashing and the forward transport live behind this
//! trait. The receiver only asks who owns an identifier and hands envelopes to
//! the forward channel.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{ContractError, IncomingPoint};

/// Snapshot of a cluster member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    name: String,
    addr: String,
    ready: bool,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, ready: bool) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            ready,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Whether the node accepts forwarded traffic
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Address usable as a statistic name segment
    pub fn sanitized_addr(&self) -> String {
        self.addr
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

/// Anything whose owning nodes can be computed, keyed by identifier
#[derive(Debug, Clone, Copy)]
pub struct DistributedDatum<'a> {
    ident: &'a str,
    id: i64,
}

impl<'a> DistributedDatum<'a> {
    pub fn new(ident: &'a str, id: i64) -> Self {
        Self { ident, id }
    }

    /// Routing key
    pub fn key(&self) -> &'a str {
        self.ident
    }

    /// Persistence id (0 if not materialized)
    pub fn id(&self) -> i64 {
        self.id
    }
}

/// Encoded point addressed to a cluster node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardEnvelope {
    /// Destination node name
    pub destination: String,

    /// bincode-encoded [`IncomingPoint`]
    pub body: Bytes,
}

impl ForwardEnvelope {
    /// Encode a point for `node`
    pub fn encode(node: &ClusterNode, point: &IncomingPoint) -> Result<Self, ContractError> {
        let body = bincode::serialize(point).map_err(|e| ContractError::Encode {
            message: e.to_string(),
        })?;
        Ok(Self {
            destination: node.name().to_string(),
            body: Bytes::from(body),
        })
    }

    /// Decode the carried point
    pub fn decode(&self) -> Result<IncomingPoint, ContractError> {
        bincode::deserialize(&self.body).map_err(|e| ContractError::Decode {
            message: format!("bincode error: {e}"),
            source: Some(e),
        })
    }
}

/// Director side of the forward transport
#[derive(Debug)]
pub struct ForwardChannel {
    /// Outbound envelopes, addressed by `destination`
    pub tx: mpsc::Sender<ForwardEnvelope>,

    /// Envelopes forwarded to this node by others
    pub rx: mpsc::Receiver<ForwardEnvelope>,
}

/// Cluster router trait
#[trait_variant::make(ClusterRouter: Send)]
pub trait LocalClusterRouter {
    /// Ordered owners of `datum` (empty if cluster state is unknown)
    fn owners_of(&self, datum: &DistributedDatum<'_>) -> Vec<ClusterNode>;

    /// This process as a cluster member
    fn local_node(&self) -> ClusterNode;

    /// Register the point-forward message type
    ///
    /// # Errors
    /// Returns a forward channel error if already registered
    fn register_forward_channel(&self) -> Result<ForwardChannel, ContractError>;

    /// Notifications of membership changes
    fn membership_changes(&self) -> mpsc::Receiver<()>;

    /// Recompute ownership after a membership change, bounded by `timeout`
    async fn rebalance(&self, timeout: Duration) -> Result<(), ContractError>;

    /// Declare the local node eligible to receive forwarded traffic
    fn mark_ready(&self, ready: bool);
}

/// Router type of a receiver running without a cluster
///
/// Uninhabited: a `Standalone` value never exists, it only fills the router
/// type parameter when clustering is disabled.
#[derive(Debug)]
pub enum Standalone {}

impl ClusterRouter for Standalone {
    fn owners_of(&self, _datum: &DistributedDatum<'_>) -> Vec<ClusterNode> {
        match *self {}
    }

    fn local_node(&self) -> ClusterNode {
        match *self {}
    }

    fn register_forward_channel(&self) -> Result<ForwardChannel, ContractError> {
        match *self {}
    }

    fn membership_changes(&self) -> mpsc::Receiver<()> {
        match *self {}
    }

    async fn rebalance(&self, _timeout: Duration) -> Result<(), ContractError> {
        match *self {}
    }

    fn mark_ready(&self, _ready: bool) {
        match *self {}
    }
}
