//! Receiver run statistics.

use std::time::Duration;

use director::CountersSnapshot;
use observability::StatsReport;

/// Statistics from a receiver run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Non-empty lines read from all connections
    pub lines_received: u64,

    /// Lines that failed to parse
    pub lines_malformed: u64,

    /// Series materialized in the store
    pub series: usize,

    /// Director counters at stop
    pub counters: CountersSnapshot,

    /// Everything the stats sink recorded
    pub report: StatsReport,
}

impl PipelineStats {
    /// Points per second accepted locally or forwarded
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.counters.accepted + self.counters.forwarded) as f64 / secs
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Receiver Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines received: {}", self.lines_received);
        println!("   ├─ Lines malformed: {}", self.lines_malformed);
        println!("   ├─ Series: {}", self.series);
        println!("   └─ Throughput: {:.2} points/s", self.throughput());

        let c = &self.counters;
        println!("\n📈 Director");
        println!("   ├─ Total: {}", c.total);
        println!("   ├─ Accepted: {}", c.accepted);
        println!("   ├─ Forwarded: {}", c.forwarded);
        println!("   ├─ Dropped: {}", c.dropped);
        println!("   ├─ NaN skipped: {}", c.nan_skipped);
        println!("   └─ Created: {}", c.created);

        println!("\n{}", self.report);
    }
}
