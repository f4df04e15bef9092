//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::pipeline::{ReceiverPipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_receiver(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut blueprint = load_blueprint(&args.config)?;

    if let Some(ref listen) = args.listen {
        info!(listen = %listen, "Overriding listen address from CLI");
        blueprint.receiver.listen_addr = listen.clone();
    }

    info!(
        listen = %blueprint.receiver.listen_addr,
        series = blueprint.series.len(),
        clustered = blueprint.is_clustered(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline = ReceiverPipeline::new(PipelineConfig {
        blueprint,
        metrics_port: (args.metrics_port != 0).then_some(args.metrics_port),
    });

    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Receiver failed")?;

    info!(
        lines = stats.lines_received,
        malformed = stats.lines_malformed,
        duration_secs = stats.duration.as_secs_f64(),
        "Receiver stopped"
    );
    stats.print_summary();

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, stopping receiver...");
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::ReceiverBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Receiver:");
    println!("  Listen: {}", blueprint.receiver.listen_addr);
    println!("  Channel capacity: {}", blueprint.receiver.channel_capacity);
    println!("  Flush threshold: {}", blueprint.receiver.flush_threshold);

    match &blueprint.cluster {
        Some(cluster) => {
            println!(
                "\nCluster (local: {}, replication: {}):",
                cluster.local_node, cluster.replication
            );
            for node in &cluster.nodes {
                println!("  - {} ({})", node.name, node.addr);
            }
        }
        None => println!("\nCluster: disabled"),
    }

    println!("\nSeries ({}):", blueprint.series.len());
    for spec in &blueprint.series {
        println!(
            "  - {} (step {}s, {} archives)",
            spec.pattern,
            spec.step_secs,
            spec.archives.len()
        );
    }
    println!();
}
