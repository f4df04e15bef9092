//! # Backends
//!
//! Reference collaborators for the receiver core.
//!
//! - [`MemoryStore`]: in-memory persistence with a pause switch and failure
//!   injection
//! - [`StaticCluster`]: cluster router over a fixed node list
//! - [`UdpTransport`]: forward envelopes over UDP

mod memory_store;
mod static_cluster;
mod udp_transport;

pub use memory_store::{MemoryRecord, MemoryStore};
pub use static_cluster::{ClusterTransport, StaticCluster};
pub use udp_transport::UdpTransport;
