//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    receiver: ReceiverInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster: Option<ClusterInfo>,
    series: Vec<SeriesInfo>,
}

#[derive(Serialize)]
struct ReceiverInfo {
    listen_addr: String,
    channel_capacity: usize,
    flush_threshold: u64,
    rebalance_timeout_secs: u64,
    report_interval_ms: u64,
}

#[derive(Serialize)]
struct ClusterInfo {
    local_node: String,
    replication: usize,
    nodes: Vec<NodeInfo>,
}

#[derive(Serialize)]
struct NodeInfo {
    name: String,
    addr: String,
}

#[derive(Serialize)]
struct SeriesInfo {
    pattern: String,
    step_secs: u64,
    heartbeat_secs: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    archives: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = super::load_blueprint(&args.config)?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{json}");
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn describe_archive(archive: &contracts::ArchiveSpec) -> String {
    format!(
        "{:?} every {}s x {} rows",
        archive.function, archive.step_secs, archive.rows
    )
}

fn build_config_info(blueprint: &contracts::ReceiverBlueprint, args: &InfoArgs) -> ConfigInfo {
    let receiver = &blueprint.receiver;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        receiver: ReceiverInfo {
            listen_addr: receiver.listen_addr.clone(),
            channel_capacity: receiver.channel_capacity,
            flush_threshold: receiver.flush_threshold,
            rebalance_timeout_secs: receiver.rebalance_timeout_secs,
            report_interval_ms: receiver.report_interval_ms,
        },
        cluster: blueprint.cluster.as_ref().map(|c| ClusterInfo {
            local_node: c.local_node.clone(),
            replication: c.replication,
            nodes: c
                .nodes
                .iter()
                .map(|n| NodeInfo {
                    name: n.name.clone(),
                    addr: n.addr.clone(),
                })
                .collect(),
        }),
        series: blueprint
            .series
            .iter()
            .map(|s| SeriesInfo {
                pattern: s.pattern.clone(),
                step_secs: s.step_secs,
                heartbeat_secs: s.heartbeat_secs,
                archives: if args.archives {
                    s.archives.iter().map(describe_archive).collect()
                } else {
                    Vec::new()
                },
            })
            .collect(),
    }
}

fn print_config_info(blueprint: &contracts::ReceiverBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Series Receiver Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let receiver = &blueprint.receiver;
    println!("📥 Receiver");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Listen: {}", receiver.listen_addr);
    println!("   ├─ Channel capacity: {}", receiver.channel_capacity);
    println!("   ├─ Flush threshold: {}", receiver.flush_threshold);
    println!("   ├─ Rebalance timeout: {}s", receiver.rebalance_timeout_secs);
    println!("   └─ Report interval: {}ms", receiver.report_interval_ms);

    match &blueprint.cluster {
        Some(cluster) => {
            println!(
                "\n🌐 Cluster (local: {}, replication: {})",
                cluster.local_node, cluster.replication
            );
            for (i, node) in cluster.nodes.iter().enumerate() {
                let prefix = if i == cluster.nodes.len() - 1 { "└─" } else { "├─" };
                let marker = if node.name == cluster.local_node { " *" } else { "" };
                println!("   {} {} ({}){}", prefix, node.name, node.addr, marker);
            }
        }
        None => println!("\n🌐 Cluster: disabled"),
    }

    println!("\n📈 Series ({})", blueprint.series.len());
    for (i, spec) in blueprint.series.iter().enumerate() {
        let is_last = i == blueprint.series.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!(
            "   {} {} (step {}s, heartbeat {}s)",
            prefix, spec.pattern, spec.step_secs, spec.heartbeat_secs
        );

        if args.archives && !spec.archives.is_empty() {
            for (j, archive) in spec.archives.iter().enumerate() {
                let archive_prefix = if j == spec.archives.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {}  {} {}",
                    child_prefix,
                    archive_prefix,
                    describe_archive(archive)
                );
            }
        } else {
            println!("   {}  └─ {} archives", child_prefix, spec.archives.len());
        }
    }

    println!();
}
