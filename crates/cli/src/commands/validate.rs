//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    listen_addr: String,
    series_count: usize,
    archive_count: usize,
    cluster_nodes: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{json}");
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match super::load_blueprint(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    listen_addr: blueprint.receiver.listen_addr.clone(),
                    series_count: blueprint.series.len(),
                    archive_count: blueprint.series.iter().map(|s| s.archives.len()).sum(),
                    cluster_nodes: blueprint.cluster.as_ref().map_or(0, |c| c.nodes.len()),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::ReceiverBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut patterns = HashSet::new();
    for spec in &blueprint.series {
        if !patterns.insert(spec.pattern.as_str()) {
            warnings.push(format!(
                "Series pattern '{}' appears more than once - only the first is used",
                spec.pattern
            ));
        }
        if spec.archives.is_empty() {
            warnings.push(format!(
                "Series '{}' has no archives - points are accepted but not retained",
                spec.pattern
            ));
        }
    }

    if let Some(cluster) = &blueprint.cluster {
        if cluster.nodes.len() == 1 {
            warnings.push("Cluster has a single node - forwarding never happens".to_string());
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Listen: {}", summary.listen_addr);
            println!("  Series: {}", summary.series_count);
            println!("  Archives: {}", summary.archive_count);
            println!("  Cluster nodes: {}", summary.cluster_nodes);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {warning}");
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {error}");
        }
    }
}
