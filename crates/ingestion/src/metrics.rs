//! Relay metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of a single relay
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Items received from the input
    pub received: AtomicU64,

    /// Items delivered to the output
    pub delivered: AtomicU64,

    /// Items that had to wait in the queue
    pub spilled: AtomicU64,

    /// Items discarded because the output closed
    pub discarded: AtomicU64,

    /// Largest queue length observed
    pub peak_queue_len: AtomicUsize,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a spill and the queue length after it
    pub fn record_spilled(&self, queue_len: usize) {
        self.spilled.fetch_add(1, Ordering::Relaxed);
        self.peak_queue_len.fetch_max(queue_len, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            spilled: self.spilled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            peak_queue_len: self.peak_queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Relay metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySnapshot {
    pub received: u64,
    pub delivered: u64,
    pub spilled: u64,
    pub discarded: u64,
    pub peak_queue_len: usize,
}
