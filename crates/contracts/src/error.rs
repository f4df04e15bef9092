//! Layered error definitions
//!
//! Categorized by source: config / storage / cluster / codec

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Storage Errors =====
    /// Fetch, create, apply or flush failed for a series
    #[error("storage error for '{ident}': {message}")]
    Storage { ident: String, message: String },

    // ===== Cluster Errors =====
    /// Destination node is not accepting forwarded traffic
    #[error("node '{node}' is not ready")]
    NodeNotReady { node: String },

    /// Forward channel could not be registered or is gone
    #[error("forward channel error: {message}")]
    ForwardChannel { message: String },

    /// Ownership recomputation failed
    #[error("cluster rebalance failed: {message}")]
    Rebalance { message: String },

    /// Ownership recomputation did not finish in time
    #[error("cluster rebalance timed out after {waited_ms}ms")]
    RebalanceTimeout { waited_ms: u64 },

    // ===== Codec Errors =====
    /// Forward envelope could not be encoded
    #[error("envelope encode error: {message}")]
    Encode { message: String },

    /// Forward envelope could not be decoded
    #[error("envelope decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create storage error
    pub fn storage(ident: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            ident: ident.into(),
            message: message.into(),
        }
    }

    /// Create node-not-ready error
    pub fn node_not_ready(node: impl Into<String>) -> Self {
        Self::NodeNotReady { node: node.into() }
    }

    /// Create forward channel error
    pub fn forward_channel(message: impl Into<String>) -> Self {
        Self::ForwardChannel {
            message: message.into(),
        }
    }

    /// Create rebalance error
    pub fn rebalance(message: impl Into<String>) -> Self {
        Self::Rebalance {
            message: message.into(),
        }
    }
}
