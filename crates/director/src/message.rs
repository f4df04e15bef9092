//! Items carried by the Director's queues

use std::sync::Arc;

use contracts::{IncomingPoint, SeriesSpec};

/// Item on the Director's inbound path
#[derive(Debug)]
pub enum Inbound<R> {
    /// A point from a producer or from the forward reader
    Point(IncomingPoint),
    /// A placeholder the Loader has resolved
    Handle(ResolvedHandle<R>),
    /// Stop accepting new loads and drain
    Shutdown,
}

/// Request for the Loader to materialize a placeholder
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub ident: String,
    pub spec: Arc<SeriesSpec>,
}

impl LoadRequest {
    pub fn new(ident: impl Into<String>, spec: Arc<SeriesSpec>) -> Self {
        Self {
            ident: ident.into(),
            spec,
        }
    }
}

/// Loader result for one identifier
///
/// `record` is `None` when persistence failed; the identifier is retried on
/// its next point.
#[derive(Debug)]
pub struct ResolvedHandle<R> {
    pub ident: String,
    pub record: Option<R>,
    pub created: bool,
}

impl<R> ResolvedHandle<R> {
    pub fn is_resolved(&self) -> bool {
        self.record.is_some()
    }
}
