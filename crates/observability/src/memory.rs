//! In-memory stats sinks for inspection and end-of-run reports

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::StatsSink;

#[derive(Debug, Default)]
struct Recorded {
    counters: HashMap<String, f64>,
    gauges: HashMap<String, Vec<f64>>,
}

/// Stats sink that keeps counters and every gauge sample in memory
#[derive(Debug, Default)]
pub struct MemoryStats {
    recorded: Mutex<Recorded>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a counter (0 if never counted)
    pub fn counter(&self, name: &str) -> f64 {
        self.lock().counters.get(name).copied().unwrap_or(0.0)
    }

    /// Every sample of a gauge, oldest first
    pub fn gauge_history(&self, name: &str) -> Vec<f64> {
        self.lock().gauges.get(name).cloned().unwrap_or_default()
    }

    pub fn last_gauge(&self, name: &str) -> Option<f64> {
        self.lock().gauges.get(name).and_then(|s| s.last().copied())
    }

    pub fn gauge_summary(&self, name: &str) -> StatsSummary {
        self.lock()
            .gauges
            .get(name)
            .map(|samples| StatsSummary::from_samples(samples))
            .unwrap_or_default()
    }

    /// Counters with the given prefix
    pub fn counters_with_prefix(&self, prefix: &str) -> BTreeMap<String, f64> {
        self.lock()
            .counters
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }

    pub fn report(&self) -> StatsReport {
        let recorded = self.lock();
        let counters = recorded
            .counters
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        let gauges = recorded
            .gauges
            .iter()
            .map(|(name, samples)| (name.clone(), StatsSummary::from_samples(samples)))
            .collect();
        StatsReport { counters, gauges }
    }

    pub fn reset(&self) {
        *self.lock() = Recorded::default();
    }
}

impl StatsSink for MemoryStats {
    fn count(&self, name: &str, value: f64) {
        *self.lock().counters.entry(name.to_string()).or_insert(0.0) += value;
    }

    fn gauge(&self, name: &str, value: f64) {
        self.lock()
            .gauges
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

/// Summary of gauge samples
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
}

impl StatsSummary {
    pub fn from_samples(samples: &[f64]) -> Self {
        let Some(first) = samples.first() else {
            return Self::default();
        };
        let n = samples.len() as f64;
        let (min, max, sum) = samples
            .iter()
            .fold((*first, *first, 0.0), |(min, max, sum), v| {
                (min.min(*v), max.max(*v), sum + v)
            });
        let mean = sum / n;
        let std_dev = if samples.len() < 2 {
            0.0
        } else {
            let squares: f64 = samples.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (n - 1.0)).sqrt()
        };

        Self {
            count: samples.len() as u64,
            min,
            max,
            mean,
            std_dev,
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.1} max={:.1} mean={:.2} std={:.2} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Snapshot of a [`MemoryStats`], sorted by name
#[derive(Debug, Clone, Default)]
pub struct StatsReport {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, StatsSummary>,
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Receiver Statistics ===")?;
        for (name, value) in &self.counters {
            writeln!(f, "{name}: {value}")?;
        }
        if !self.gauges.is_empty() {
            writeln!(f, "Gauges:")?;
            for (name, summary) in &self.gauges {
                writeln!(f, "  {name}: {summary}")?;
            }
        }
        Ok(())
    }
}

/// Fan-out to several sinks
#[derive(Clone, Default)]
pub struct TeeStats {
    sinks: Vec<Arc<dyn StatsSink>>,
}

impl TeeStats {
    pub fn new(sinks: Vec<Arc<dyn StatsSink>>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: Arc<dyn StatsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatsSink for TeeStats {
    fn count(&self, name: &str, value: f64) {
        for sink in &self.sinks {
            sink.count(name, value);
        }
    }

    fn gauge(&self, name: &str, value: f64) {
        for sink in &self.sinks {
            sink.gauge(name, value);
        }
    }
}
