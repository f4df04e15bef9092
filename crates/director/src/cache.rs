//! DataSourceCache - identifier to cached handle
//!
//! Owned by the Director loop alone; entries carry no locks.

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{ContractError, IncomingPoint, SeriesRecord, SeriesSpec};
use regex::Regex;

/// First-match lookup of the series specification for an identifier
#[derive(Debug, Clone)]
pub struct SpecMatcher {
    specs: Vec<(Regex, Arc<SeriesSpec>)>,
}

impl SpecMatcher {
    /// Compile every spec pattern, in configuration order
    ///
    /// # Errors
    /// Returns a validation error naming the first pattern that fails to compile
    pub fn new(specs: Vec<SeriesSpec>) -> Result<Self, ContractError> {
        let specs = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                let regex = Regex::new(&spec.pattern).map_err(|e| {
                    ContractError::config_validation(format!("series[{i}].pattern"), e.to_string())
                })?;
                Ok((regex, Arc::new(spec)))
            })
            .collect::<Result<Vec<_>, ContractError>>()?;
        Ok(Self { specs })
    }

    pub fn find(&self, ident: &str) -> Option<Arc<SeriesSpec>> {
        self.specs
            .iter()
            .find(|(regex, _)| regex.is_match(ident))
            .map(|(_, spec)| Arc::clone(spec))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Cached view of one series
#[derive(Debug)]
pub struct CachedHandle<R> {
    pub(crate) ident: String,
    pub(crate) spec: Arc<SeriesSpec>,
    pub(crate) record: Option<R>,
    pub(crate) pending: Vec<IncomingPoint>,
    pub(crate) loading: bool,
}

impl<R: SeriesRecord> CachedHandle<R> {
    fn placeholder(ident: &str, spec: Arc<SeriesSpec>) -> Self {
        Self {
            ident: ident.to_string(),
            spec,
            record: None,
            pending: Vec::new(),
            loading: false,
        }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn spec(&self) -> &SeriesSpec {
        &self.spec
    }

    /// Persistence id, 0 until materialized
    pub fn id(&self) -> i64 {
        self.record.as_ref().map_or(0, SeriesRecord::id)
    }

    pub fn needs_materialization(&self) -> bool {
        self.record.is_none()
    }

    /// Whether a load request is in flight
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn pending(&self) -> &[IncomingPoint] {
        &self.pending
    }

    /// Points accumulated in the record since its last flush
    pub fn point_count(&self) -> u64 {
        self.record.as_ref().map_or(0, SeriesRecord::point_count)
    }

    pub fn record(&self) -> Option<&R> {
        self.record.as_ref()
    }

    pub(crate) fn take_pending(&mut self) -> Vec<IncomingPoint> {
        std::mem::take(&mut self.pending)
    }
}

/// Identifier to handle map
#[derive(Debug)]
pub struct DataSourceCache<R> {
    matcher: SpecMatcher,
    entries: HashMap<String, CachedHandle<R>>,
}

impl<R: SeriesRecord> DataSourceCache<R> {
    pub fn new(matcher: SpecMatcher) -> Self {
        Self {
            matcher,
            entries: HashMap::new(),
        }
    }

    /// Existing handle, or a fresh placeholder if a spec matches
    ///
    /// Returns `None` when no series specification matches `ident`.
    pub fn resolve_or_placeholder(&mut self, ident: &str) -> Option<&mut CachedHandle<R>> {
        if !self.entries.contains_key(ident) {
            let spec = self.matcher.find(ident)?;
            self.entries
                .insert(ident.to_string(), CachedHandle::placeholder(ident, spec));
        }
        self.entries.get_mut(ident)
    }

    pub fn get(&self, ident: &str) -> Option<&CachedHandle<R>> {
        self.entries.get(ident)
    }

    pub fn get_mut(&mut self, ident: &str) -> Option<&mut CachedHandle<R>> {
        self.entries.get_mut(ident)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every buffered point, returning how many were discarded
    pub(crate) fn discard_pending(&mut self) -> u64 {
        self.entries
            .values_mut()
            .map(|handle| handle.take_pending().len() as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backends::MemoryRecord;

    fn spec(pattern: &str) -> SeriesSpec {
        SeriesSpec {
            pattern: pattern.to_string(),
            step_secs: 10,
            heartbeat_secs: 120,
            archives: Vec::new(),
        }
    }

    fn cache() -> DataSourceCache<MemoryRecord> {
        let matcher = SpecMatcher::new(vec![spec(r"^host\.cpu"), spec(r"^host\.")]).unwrap();
        DataSourceCache::new(matcher)
    }

    #[test]
    fn test_first_matching_spec_wins() {
        let matcher = SpecMatcher::new(vec![spec(r"^a\."), spec(r"^a\.b")]).unwrap();
        assert_eq!(matcher.find("a.b.c").unwrap().pattern, r"^a\.");
        assert!(matcher.find("z").is_none());
    }

    #[test]
    fn test_bad_pattern_names_field() {
        let err = SpecMatcher::new(vec![spec("ok"), spec("(")]).unwrap_err();
        assert!(err.to_string().contains("series[1].pattern"));
    }

    #[test]
    fn test_placeholder_created_once() {
        let mut cache = cache();

        let handle = cache.resolve_or_placeholder("host.cpu.user").unwrap();
        assert_eq!(handle.id(), 0);
        assert!(handle.needs_materialization());
        assert!(!handle.is_loading());
        handle.pending.push(IncomingPoint::now("host.cpu.user", 1.0));

        let again = cache.resolve_or_placeholder("host.cpu.user").unwrap();
        assert_eq!(again.pending().len(), 1);
        assert_eq!(again.spec().pattern, r"^host\.cpu");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unmatched_identifier_not_cached() {
        let mut cache = cache();
        assert!(cache.resolve_or_placeholder("db.queries").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_discard_pending() {
        let mut cache = cache();
        for ident in ["host.a", "host.b"] {
            let handle = cache.resolve_or_placeholder(ident).unwrap();
            handle.pending.push(IncomingPoint::now(ident, 1.0));
            handle.pending.push(IncomingPoint::now(ident, 2.0));
        }
        assert_eq!(cache.discard_pending(), 4);
        assert!(cache.get("host.a").unwrap().pending().is_empty());
    }
}
