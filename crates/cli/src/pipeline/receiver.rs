//! Receiver orchestrator - wires listener, Director and collaborators.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use backends::{MemoryStore, StaticCluster, UdpTransport};
use contracts::{ClusterNode, ClusterRouter, ReceiverBlueprint, StatsSink};
use director::{DirectorBuilder, DirectorConfig};
use observability::{MemoryStats, MetricsStats, TeeStats};
use tokio::net::TcpListener;
use tracing::info;

use super::listener::{accept_loop, LineCounters};
use super::stats::PipelineStats;
use crate::error::CliError;

/// Receiver configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The receiver blueprint
    pub blueprint: ReceiverBlueprint,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main receiver orchestrator
pub struct ReceiverPipeline {
    config: PipelineConfig,
}

impl ReceiverPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Serve until `shutdown` resolves, then drain and report
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {port}");
        }

        let memory = Arc::new(MemoryStats::new());
        let stats: Arc<dyn StatsSink> = Arc::new(
            TeeStats::default()
                .with(Arc::new(MetricsStats::new()))
                .with(memory.clone()),
        );
        let store = Arc::new(MemoryStore::new());
        let builder = DirectorBuilder::new(
            DirectorConfig::from_receiver(&blueprint.receiver),
            blueprint.series.clone(),
            Arc::clone(&store),
            stats,
        );

        let (handle, transport) = match &blueprint.cluster {
            Some(cluster_config) => {
                let cluster = Arc::new(StaticCluster::from_config(cluster_config));
                let handle = builder
                    .with_cluster(Arc::clone(&cluster))
                    .start()
                    .context("Failed to start director")?;

                let ends = cluster
                    .take_transport()
                    .ok_or_else(|| CliError::transport("forward channel was not registered"))?;
                let local = cluster.local_node();
                let peers: Vec<ClusterNode> = cluster
                    .nodes()
                    .into_iter()
                    .filter(|node| node.name() != local.name())
                    .collect();
                let transport = UdpTransport::start(local.addr(), &peers, ends)
                    .await
                    .context("Failed to start forward transport")?;
                (handle, Some(transport))
            }
            None => {
                let handle = builder.start().context("Failed to start director")?;
                (handle, None)
            }
        };

        let listen_addr = blueprint.receiver.listen_addr.clone();
        let listener = TcpListener::bind(&listen_addr)
            .await
            .map_err(|e| CliError::bind(&listen_addr, e))?;
        info!(addr = %listen_addr, "Plaintext listener ready");

        let lines = Arc::new(LineCounters::default());
        let accept = tokio::spawn(accept_loop(listener, handle.sender(), Arc::clone(&lines)));

        shutdown.await;

        accept.abort();
        let counters = Arc::clone(handle.counters());
        handle.shutdown().await;
        if let Some(transport) = transport {
            transport.shutdown();
        }

        Ok(PipelineStats {
            duration: start_time.elapsed(),
            lines_received: lines.received(),
            lines_malformed: lines.malformed(),
            series: store.record_count(),
            counters: counters.snapshot(),
            report: memory.report(),
        })
    }
}
