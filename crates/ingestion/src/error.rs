//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Plaintext line could not be parsed
    #[error("failed to parse line '{line}': {message}")]
    ParseFailed {
        /// Offending line (trimmed)
        line: String,
        /// Error message
        message: String,
    },
}

impl IngestionError {
    pub(crate) fn parse_failed(line: &str, message: impl Into<String>) -> Self {
        Self::ParseFailed {
            line: line.trim().to_string(),
            message: message.into(),
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
