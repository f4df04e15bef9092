//! Director counters for programmatic inspection

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the Director loop and the Loader
#[derive(Debug, Default)]
pub struct DirectorCounters {
    /// Points taken off the processing queue
    total: AtomicU64,
    /// Points with a NaN value, skipped without a trace
    nan_skipped: AtomicU64,
    /// Points dropped (unroutable, failed forward, rejected by storage)
    dropped: AtomicU64,
    /// Points applied to a local record
    accepted: AtomicU64,
    /// Points handed to the forward transport
    forwarded: AtomicU64,
    /// Persisted records created by the Loader
    created: AtomicU64,
}

impl DirectorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn inc_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn nan_skipped(&self) -> u64 {
        self.nan_skipped.load(Ordering::Relaxed)
    }

    pub fn inc_nan_skipped(&self) {
        self.nan_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn add_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn add_accepted(&self, count: u64) {
        self.accepted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn add_forwarded(&self, count: u64) {
        self.forwarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn inc_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            total: self.total(),
            nan_skipped: self.nan_skipped(),
            dropped: self.dropped(),
            accepted: self.accepted(),
            forwarded: self.forwarded(),
            created: self.created(),
        }
    }
}

/// Snapshot of director counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub total: u64,
    pub nan_skipped: u64,
    pub dropped: u64,
    pub accepted: u64,
    pub forwarded: u64,
    pub created: u64,
}

impl CountersSnapshot {
    /// Points whose fate is settled (applied, forwarded, dropped or skipped)
    pub fn settled(&self) -> u64 {
        self.accepted + self.forwarded + self.dropped + self.nan_skipped
    }
}

impl fmt::Display for CountersSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} accepted={} forwarded={} dropped={} nan={} created={}",
            self.total, self.accepted, self.forwarded, self.dropped, self.nan_skipped, self.created
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = DirectorCounters::new();
        counters.inc_total();
        counters.inc_total();
        counters.add_accepted(1);
        counters.add_dropped(1);
        counters.inc_created();

        let snap = counters.snapshot();
        assert_eq!(snap.total, 2);
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.created, 1);
        assert_eq!(snap.settled(), 2);
        assert!(snap.to_string().contains("accepted=1"));
    }
}
