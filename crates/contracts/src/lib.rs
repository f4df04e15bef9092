//! # Contracts
//!
//! Frozen interface contracts shared by every receiver crate: data points,
//! configuration blueprint, error taxonomy, and the traits of the external
//! collaborators (persistence, cluster router, statistics sink).
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Point timestamps are UTC wall-clock (`chrono::DateTime<Utc>`)
//! - `hops` counts how many times a point crossed the cluster forwarding boundary

mod blueprint;
mod cluster;
mod error;
mod persistence;
mod point;
mod stats;

pub use blueprint::*;
pub use cluster::*;
pub use error::*;
pub use persistence::*;
pub use point::*;
pub use stats::*;
