//! StatsSink trait - write-only statistics backend
//!
//! Fire-and-forget: implementations must never block or fail the caller.

/// Statistics sink
pub trait StatsSink: Send + Sync {
    /// Add `value` to the counter `name`
    fn count(&self, name: &str, value: f64);

    /// Set the gauge `name` to `value`
    fn gauge(&self, name: &str, value: f64);
}

/// Statistic names emitted by the receiver
pub mod stat {
    pub const DATAPOINTS_TOTAL: &str = "receiver.datapoints.total";
    pub const DATAPOINTS_DROPPED: &str = "receiver.datapoints.dropped";
    pub const DATAPOINTS_ACCEPTED: &str = "receiver.datapoints.accepted";
    pub const DATAPOINTS_FORWARDED: &str = "receiver.datapoints.forwarded";
    pub const CREATED: &str = "receiver.created";
    pub const QUEUE_LEN: &str = "receiver.queue_len";
    pub const LOAD_QUEUE_LEN: &str = "receiver.load_queue_len";

    /// Per-destination forward counter
    pub fn forwarded_to(destination: &str) -> String {
        format!("receiver.forwarded_to.{destination}")
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl StatsSink for NullStats {
    fn count(&self, _name: &str, _value: f64) {}

    fn gauge(&self, _name: &str, _value: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_to_name() {
        assert_eq!(
            stat::forwarded_to("10_0_0_2_7946"),
            "receiver.forwarded_to.10_0_0_2_7946"
        );
    }
}
