//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Series Receiver - cluster-aware time-series ingestion
#[derive(Parser, Debug)]
#[command(
    name = "series-receiver",
    author,
    version,
    about = "Cluster-aware time-series receiver",
    long_about = "Accepts Graphite plaintext points, materializes series on first sight,\n\
                  and routes every point to the cluster nodes that own its identifier."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SERIES_RECEIVER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SERIES_RECEIVER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the receiver until interrupted
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "receiver.toml",
        env = "SERIES_RECEIVER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the plaintext listen address from configuration
    #[arg(long, env = "SERIES_RECEIVER_LISTEN")]
    pub listen: Option<String>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "SERIES_RECEIVER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without starting the receiver
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "receiver.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "receiver.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show archive layout of every series
    #[arg(long)]
    pub archives: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
