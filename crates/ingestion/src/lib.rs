//! # Ingestion
//!
//! Elastic buffering between point producers and slower consumers.
//!
//! Responsibilities:
//! - Unbounded FIFO [`Queue`] with a concurrently readable length
//! - [`ElasticRelay`]: moves items from an input channel to an output channel,
//!   spilling into its queue instead of blocking the producer side
//! - Periodic queue length gauges for overrun visibility
//! - Parse Graphite plaintext lines into `IncomingPoint`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::ElasticRelay;
//! use tokio::sync::mpsc;
//!
//! let (in_tx, in_rx) = mpsc::channel(128);
//! let (out_tx, mut out_rx) = mpsc::channel(128);
//! let relay = ElasticRelay::spawn("inbound", in_rx, out_tx);
//!
//! in_tx.send(item).await?;          // never waits on the consumer
//! let item = out_rx.recv().await;   // arrives in order
//! println!("backlog: {}", relay.queue_len());
//! ```

mod error;
mod line;
mod metrics;
mod queue;
mod relay;
mod reporter;

// Re-exports
pub use contracts::IncomingPoint;
pub use error::{IngestionError, Result};
pub use line::parse_line;
pub use metrics::{RelayMetrics, RelaySnapshot};
pub use queue::Queue;
pub use relay::{ElasticRelay, RelayCloser, RelayHandle};
pub use reporter::spawn_queue_reporter;
