//! Persistence traits - storage engine interface consumed by the receiver
//!
//! The aggregation of points into rolling archives is the storage engine's
//! concern; the receiver only applies points in order and decides when to flush.

use crate::{ContractError, IncomingPoint, SeriesSpec};

/// In-memory view of a persisted series
pub trait SeriesRecord: Send + 'static {
    /// Persistence id, never 0 once materialized
    fn id(&self) -> i64;

    /// Apply a point to the in-memory aggregation state
    ///
    /// # Errors
    /// Returns a storage error if the point cannot be accepted (e.g. it
    /// precedes the last update)
    fn apply(&mut self, point: &IncomingPoint) -> Result<(), ContractError>;

    /// Points accumulated in memory since the last flush
    fn point_count(&self) -> u64;

    /// Discard in-memory aggregation state without saving it
    fn clear(&mut self);
}

/// Result of [`Persistence::fetch_or_create`]
#[derive(Debug)]
pub struct Fetched<R> {
    /// The loaded or newly created record
    pub record: R,

    /// True if this call created the record
    pub created: bool,
}

/// Storage engine trait
#[trait_variant::make(Persistence: Send)]
pub trait LocalPersistence {
    /// Record type handed out by this engine
    type Record: SeriesRecord;

    /// Look up a series by identifier, creating it from `spec` if absent
    ///
    /// # Errors
    /// Returns a storage error on I/O failure
    async fn fetch_or_create(
        &self,
        ident: &str,
        spec: &SeriesSpec,
    ) -> Result<Fetched<Self::Record>, ContractError>;

    /// Persist the record's accumulated state
    ///
    /// With `blocking == false` the engine may defer or coalesce the write.
    /// With `blocking == true` it must not return before the state is saved.
    async fn flush(&self, record: &mut Self::Record, blocking: bool) -> Result<(), ContractError>;
}
