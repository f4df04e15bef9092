//! # Observability
//!
//! Tracing and Prometheus metrics for the receiver.
//!
//! ## Features
//!
//! - Tracing subscriber setup (JSON/Pretty/Compact, verbosity or `RUST_LOG`)
//! - Prometheus metrics export
//! - Stats sinks: [`MetricsStats`] (metrics facade), [`MemoryStats`]
//!   (in-memory, for tests and end-of-run reports), [`TeeStats`] (fan-out)
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use observability::{LogFormat, MemoryStats, MetricsStats, ObservabilityConfig, TeeStats};
//!
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     ..Default::default()
//! })?;
//!
//! let memory = Arc::new(MemoryStats::new());
//! let stats = TeeStats::default()
//!     .with(Arc::new(MetricsStats::new()))
//!     .with(memory.clone());
//! ```

pub mod memory;
pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::memory::{MemoryStats, StatsReport, StatsSummary, TeeStats};
pub use crate::metrics::MetricsStats;

/// Default Prometheus port
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Log level filter
    pub level: String,
    /// Let `RUST_LOG` replace `level` when set
    pub env_override: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            level: "info".to_string(),
            env_override: true,
        }
    }
}

impl ObservabilityConfig {
    /// Level from `-v`/`-q` flags: quiet pins `warn` regardless of `RUST_LOG`
    pub fn from_verbosity(log_format: LogFormat, verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            metrics_port: None,
            level: level.to_string(),
            env_override: !quiet,
        }
    }

    fn filter(&self) -> EnvFilter {
        if self.env_override {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
        } else {
            EnvFilter::new(&self.level)
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Single line
    Compact,
}

/// Install the tracing subscriber and, if configured, the Prometheus exporter
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        level = %config.level,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// Install only the Prometheus exporter (tracing set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
