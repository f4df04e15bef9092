//! Director error types

use thiserror::Error;

/// Director-specific errors
#[derive(Debug, Error)]
pub enum DirectorError {
    /// The inbound path was closed by shutdown
    #[error("director inbound path is closed")]
    InboundClosed,

    /// The inbound channel is momentarily full (non-waiting submit only)
    #[error("director inbound path is full")]
    InboundFull,

    /// Contract error (spec compilation, cluster registration)
    #[error("director error: {0}")]
    Contract(#[from] contracts::ContractError),
}
