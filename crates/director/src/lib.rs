//! # Director
//!
//! Routing core of the receiver.
//!
//! Responsibilities:
//! - Own the identifier cache and every pending-points buffer
//! - Serialize record creation through a single Loader worker
//! - Apply points to locally owned series, forward the rest (at most once,
//!   hop-limited) to their cluster owners
//! - Keep producers decoupled from slow storage via elastic relays
//!
//! ## Usage Example
//!
//! ```ignore
//! let handle = DirectorBuilder::new(config, specs, store, stats)
//!     .with_cluster(cluster)
//!     .start()?;
//! let sender = handle.sender();
//! sender.submit(IncomingPoint::now("host.cpu", 0.5)).await?;
//! handle.shutdown().await;
//! ```

pub mod cache;
pub mod director;
pub mod error;
pub mod forward;
pub mod handle;
pub mod loader;
pub mod message;
pub mod metrics;
mod route;

pub use cache::{CachedHandle, DataSourceCache, SpecMatcher};
pub use contracts::IncomingPoint;
pub use director::{DirectorBuilder, DirectorConfig, DirectorState};
pub use error::DirectorError;
pub use forward::{forward_point, run_forward_reader, Forwarded};
pub use handle::{DirectorHandle, PointSender};
pub use loader::{Loader, LoaderHandle};
pub use message::{Inbound, LoadRequest, ResolvedHandle};
pub use metrics::{CountersSnapshot, DirectorCounters};
pub use route::RouteOutcome;
