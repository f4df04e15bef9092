//! IncomingPoint - Ingestion output
//!
//! A single value submitted for one series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of cluster crossings a point may accumulate.
pub const MAX_HOPS: u32 = 2;

/// A data point on its way to the owning series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingPoint {
    /// Series identifier
    pub ident: String,

    /// Sample time
    pub timestamp: DateTime<Utc>,

    /// Sample value
    pub value: f64,

    /// Number of times this point crossed the cluster forwarding boundary
    #[serde(default)]
    pub hops: u32,
}

impl IncomingPoint {
    /// Create a point that has not been forwarded yet
    pub fn new(ident: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            ident: ident.into(),
            timestamp,
            value,
            hops: 0,
        }
    }

    /// Create a point stamped with the current time
    pub fn now(ident: impl Into<String>, value: f64) -> Self {
        Self::new(ident, Utc::now(), value)
    }

    /// NaN carries no distinguishable meaning and is never stored or forwarded
    pub fn is_nan(&self) -> bool {
        self.value.is_nan()
    }

    /// Whether this point already crossed the cluster boundary once
    pub fn was_forwarded(&self) -> bool {
        self.hops > 0
    }

    /// Whether a received point already exceeded [`MAX_HOPS`]
    pub fn exceeds_hop_limit(&self) -> bool {
        self.hops > MAX_HOPS
    }
}
