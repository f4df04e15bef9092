//! ReceiverBlueprint - Config Loader output
//!
//! Describes the complete receiver configuration: listener and pipeline tuning,
//! optional cluster membership, and the series specifications that decide which
//! identifiers are accepted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete receiver configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Listener and pipeline settings
    #[serde(default)]
    pub receiver: ReceiverConfig,

    /// Cluster settings (None = clustering disabled)
    #[serde(default)]
    pub cluster: Option<ClusterConfig>,

    /// Series specifications, first match wins
    pub series: Vec<SeriesSpec>,
}

impl ReceiverBlueprint {
    /// Whether points may be routed to other nodes
    pub fn is_clustered(&self) -> bool {
        self.cluster.is_some()
    }
}

/// Listener and pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Plaintext listener address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Capacity of the bounded hand-off channels between pipeline stages
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Accumulated point count above which a blocking flush is performed
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: u64,

    /// Upper bound for a cluster rebalance
    #[serde(default = "default_rebalance_timeout_secs")]
    pub rebalance_timeout_secs: u64,

    /// Queue length gauge reporting period
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

impl ReceiverConfig {
    pub fn rebalance_timeout(&self) -> Duration {
        Duration::from_secs(self.rebalance_timeout_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            channel_capacity: default_channel_capacity(),
            flush_threshold: default_flush_threshold(),
            rebalance_timeout_secs: default_rebalance_timeout_secs(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:2003".to_string()
}

fn default_channel_capacity() -> usize {
    128
}

fn default_flush_threshold() -> u64 {
    256
}

fn default_rebalance_timeout_secs() -> u64 {
    45
}

fn default_report_interval_ms() -> u64 {
    1000
}

/// Cluster membership as seen by the static router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Name of this process in `nodes`
    pub local_node: String,

    /// Number of owners per identifier
    #[serde(default = "default_replication")]
    pub replication: usize,

    /// All cluster members, including the local one
    pub nodes: Vec<NodeConfig>,
}

fn default_replication() -> usize {
    1
}

/// A cluster member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node name
    pub name: String,

    /// Forward transport address (host:port)
    pub addr: String,
}

/// Series specification
///
/// An identifier matching `pattern` is accepted and, on first sight,
/// materialized in persistence with this step, heartbeat and archive layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    /// Regular expression matched against the identifier
    pub pattern: String,

    /// Primary data point interval in seconds
    #[serde(default = "default_step_secs")]
    pub step_secs: u64,

    /// Max gap between points before the interval is unknown
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Rolling aggregation archives
    #[serde(default)]
    pub archives: Vec<ArchiveSpec>,
}

fn default_step_secs() -> u64 {
    10
}

fn default_heartbeat_secs() -> u64 {
    120
}

/// Rolling aggregation archive layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSpec {
    /// Consolidation function
    pub function: ConsolidationFn,

    /// Slot width in seconds
    pub step_secs: u64,

    /// Number of slots kept
    pub rows: u64,
}

/// Consolidation function of an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationFn {
    Average,
    Min,
    Max,
    Last,
}
