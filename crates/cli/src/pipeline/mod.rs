//! Receiver wiring: listener, Director and reference collaborators.

mod listener;
mod receiver;
mod stats;

pub use receiver::{PipelineConfig, ReceiverPipeline};
