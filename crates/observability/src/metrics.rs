//! Metrics facade stats sink
//!
//! Receiver statistics go through the `metrics` crate facade and are exported
//! by whatever recorder is installed (Prometheus via [`crate::init_metrics_only`]).

use contracts::StatsSink;
use metrics::{counter, gauge};

/// Stats sink backed by the `metrics` facade
///
/// Counter increments are rounded to whole numbers. Without an installed
/// recorder every call is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsStats;

impl MetricsStats {
    pub fn new() -> Self {
        Self
    }
}

impl StatsSink for MetricsStats {
    fn count(&self, name: &str, value: f64) {
        if value > 0.0 {
            counter!(name.to_owned()).increment(value.round() as u64);
        }
    }

    fn gauge(&self, name: &str, value: f64) {
        gauge!(name.to_owned()).set(value);
    }
}
