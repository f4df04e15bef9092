//! MemoryStore - in-memory persistence engine
//!
//! Keeps every series in a map, with failure injection and a pause switch to
//! simulate slow storage.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{ContractError, Fetched, IncomingPoint, Persistence, SeriesRecord, SeriesSpec};
use tokio::sync::watch;
use tracing::{debug, instrument};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Persisted state of one series
#[derive(Debug)]
struct SeriesEntry {
    id: i64,
    ident: String,
    step_secs: u64,
    applied: Mutex<Vec<(DateTime<Utc>, f64)>>,
    persisted: AtomicU64,
}

/// In-memory record handed to the Director
#[derive(Debug)]
pub struct MemoryRecord {
    entry: Arc<SeriesEntry>,
    last_update: Option<DateTime<Utc>>,
    unsaved: u64,
}

impl MemoryRecord {
    pub fn ident(&self) -> &str {
        &self.entry.ident
    }

    pub fn step_secs(&self) -> u64 {
        self.entry.step_secs
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    fn persist(&mut self) {
        self.entry.persisted.fetch_add(self.unsaved, Ordering::Relaxed);
        self.unsaved = 0;
    }
}

impl SeriesRecord for MemoryRecord {
    fn id(&self) -> i64 {
        self.entry.id
    }

    fn apply(&mut self, point: &IncomingPoint) -> Result<(), ContractError> {
        if let Some(last) = self.last_update {
            if point.timestamp < last {
                return Err(ContractError::storage(
                    &self.entry.ident,
                    format!("point at {} precedes last update {last}", point.timestamp),
                ));
            }
        }
        self.last_update = Some(point.timestamp);
        self.unsaved += 1;
        lock(&self.entry.applied).push((point.timestamp, point.value));
        Ok(())
    }

    fn point_count(&self) -> u64 {
        self.unsaved
    }

    fn clear(&mut self) {
        self.unsaved = 0;
    }
}

/// In-memory persistence engine
#[derive(Debug)]
pub struct MemoryStore {
    series: Mutex<HashMap<String, Arc<SeriesEntry>>>,
    next_id: AtomicI64,
    failing: Mutex<HashSet<String>>,
    paused: watch::Sender<bool>,
    flush_delay: Duration,
    created: AtomicU64,
    fetches: AtomicU64,
    flushes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            series: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            failing: Mutex::new(HashSet::new()),
            paused,
            flush_delay: Duration::ZERO,
            created: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
        }
    }

    /// Sleep this long in every blocking flush
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Stall storage: non-blocking flushes are deferred, blocking ones wait
    pub fn pause(&self) {
        self.paused.send_replace(true);
        debug!("MemoryStore paused");
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
        debug!("MemoryStore resumed");
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Make `fetch_or_create` fail for `ident`
    pub fn fail_ident(&self, ident: impl Into<String>) {
        lock(&self.failing).insert(ident.into());
    }

    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
    }

    /// Number of records created
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Number of series stored
    pub fn record_count(&self) -> usize {
        lock(&self.series).len()
    }

    pub fn id_of(&self, ident: &str) -> Option<i64> {
        lock(&self.series).get(ident).map(|entry| entry.id)
    }

    /// Points applied to `ident`, in application order
    pub fn history(&self, ident: &str) -> Vec<(DateTime<Utc>, f64)> {
        lock(&self.series)
            .get(ident)
            .map(|entry| lock(&entry.applied).clone())
            .unwrap_or_default()
    }

    /// Values applied to `ident`, in application order
    pub fn values(&self, ident: &str) -> Vec<f64> {
        self.history(ident).into_iter().map(|(_, v)| v).collect()
    }

    /// Points of `ident` that reached storage through a flush
    pub fn persisted_count(&self, ident: &str) -> u64 {
        lock(&self.series)
            .get(ident)
            .map_or(0, |entry| entry.persisted.load(Ordering::Relaxed))
    }

    async fn wait_resumed(&self, ident: &str) -> Result<(), ContractError> {
        let mut rx = self.paused.subscribe();
        rx.wait_for(|paused| !*paused)
            .await
            .map(|_| ())
            .map_err(|_| ContractError::storage(ident, "store shut down while paused"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for MemoryStore {
    type Record = MemoryRecord;

    #[instrument(name = "memory_store_fetch_or_create", skip(self, spec))]
    async fn fetch_or_create(
        &self,
        ident: &str,
        spec: &SeriesSpec,
    ) -> Result<Fetched<MemoryRecord>, ContractError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if lock(&self.failing).contains(ident) {
            return Err(ContractError::storage(ident, "injected failure"));
        }

        let mut series = lock(&self.series);
        let (entry, created) = match series.get(ident) {
            Some(entry) => (Arc::clone(entry), false),
            None => {
                let entry = Arc::new(SeriesEntry {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    ident: ident.to_string(),
                    step_secs: spec.step_secs,
                    applied: Mutex::new(Vec::new()),
                    persisted: AtomicU64::new(0),
                });
                series.insert(ident.to_string(), Arc::clone(&entry));
                self.created.fetch_add(1, Ordering::Relaxed);
                (entry, true)
            }
        };
        drop(series);

        let last_update = lock(&entry.applied).last().map(|(ts, _)| *ts);
        Ok(Fetched {
            record: MemoryRecord {
                entry,
                last_update,
                unsaved: 0,
            },
            created,
        })
    }

    #[instrument(name = "memory_store_flush", skip(self, record), fields(ident = %record.ident()))]
    async fn flush(&self, record: &mut MemoryRecord, blocking: bool) -> Result<(), ContractError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);

        if blocking {
            self.wait_resumed(record.ident()).await?;
            if !self.flush_delay.is_zero() {
                tokio::time::sleep(self.flush_delay).await;
            }
        } else if self.is_paused() {
            debug!(unsaved = record.unsaved, "Store paused, flush deferred");
            return Ok(());
        }

        record.persist();
        Ok(())
    }
}
