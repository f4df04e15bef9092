//! Configuration validation
//!
//! Rules:
//! - at least one series, every pattern compiles
//! - step_secs > 0, heartbeat_secs >= step_secs, archive layout non-empty
//! - receiver tuning values > 0, listen address parses
//! - cluster node names unique, addresses parse, local_node listed,
//!   replication within 1..=nodes

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ClusterConfig, ContractError, ReceiverBlueprint, ReceiverConfig, SeriesSpec};
use regex::Regex;

/// Validate a ReceiverBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ReceiverBlueprint) -> Result<(), ContractError> {
    validate_receiver(&blueprint.receiver)?;
    validate_series(&blueprint.series)?;
    if let Some(cluster) = &blueprint.cluster {
        validate_cluster(cluster)?;
    }
    Ok(())
}

fn validate_receiver(receiver: &ReceiverConfig) -> Result<(), ContractError> {
    if receiver.listen_addr.parse::<SocketAddr>().is_err() {
        return Err(ContractError::config_validation(
            "receiver.listen_addr",
            format!("'{}' is not a socket address", receiver.listen_addr),
        ));
    }

    let positive = [
        ("receiver.channel_capacity", receiver.channel_capacity as u64),
        ("receiver.flush_threshold", receiver.flush_threshold),
        ("receiver.rebalance_timeout_secs", receiver.rebalance_timeout_secs),
        ("receiver.report_interval_ms", receiver.report_interval_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(ContractError::config_validation(field, "must be > 0"));
        }
    }
    Ok(())
}

fn validate_series(series: &[SeriesSpec]) -> Result<(), ContractError> {
    if series.is_empty() {
        return Err(ContractError::config_validation(
            "series",
            "at least one series specification is required",
        ));
    }

    for (idx, spec) in series.iter().enumerate() {
        if let Err(e) = Regex::new(&spec.pattern) {
            return Err(ContractError::config_validation(
                format!("series[{idx}].pattern"),
                format!("invalid pattern '{}': {e}", spec.pattern),
            ));
        }

        if spec.step_secs == 0 {
            return Err(ContractError::config_validation(
                format!("series[{idx}].step_secs"),
                "step_secs must be > 0",
            ));
        }

        if spec.heartbeat_secs < spec.step_secs {
            return Err(ContractError::config_validation(
                format!("series[{idx}].heartbeat_secs"),
                format!(
                    "heartbeat_secs ({}) must be >= step_secs ({})",
                    spec.heartbeat_secs, spec.step_secs
                ),
            ));
        }

        for (aidx, archive) in spec.archives.iter().enumerate() {
            if archive.step_secs == 0 || archive.rows == 0 {
                return Err(ContractError::config_validation(
                    format!("series[{idx}].archives[{aidx}]"),
                    "step_secs and rows must be > 0",
                ));
            }
        }
    }
    Ok(())
}

fn validate_cluster(cluster: &ClusterConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for node in &cluster.nodes {
        if !seen.insert(node.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("cluster.nodes[name={}]", node.name),
                "duplicate node name",
            ));
        }
        if node.addr.parse::<SocketAddr>().is_err() {
            return Err(ContractError::config_validation(
                format!("cluster.nodes[name={}].addr", node.name),
                format!("'{}' is not a socket address", node.addr),
            ));
        }
    }

    if !seen.contains(cluster.local_node.as_str()) {
        return Err(ContractError::config_validation(
            "cluster.local_node",
            format!("local_node '{}' not found in cluster.nodes", cluster.local_node),
        ));
    }

    if cluster.replication == 0 || cluster.replication > cluster.nodes.len() {
        return Err(ContractError::config_validation(
            "cluster.replication",
            format!(
                "replication must be within 1..={}, got {}",
                cluster.nodes.len(),
                cluster.replication
            ),
        ));
    }
    Ok(())
}
