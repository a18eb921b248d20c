//! Error types for cache and lock operations
//!
//! Every store-facing call returns a [`CacheError`]. Callers on the query path
//! treat these as "fail open" signals: a failed lookup is a miss and a failed
//! write is a no-op. The error is still typed so that the decision is made
//! explicitly by the caller instead of by blanket suppression.

use thiserror::Error;

/// Main error type for cache, semantic index and lock operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing key/value store or vector index could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Operation timeout
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// The store refused the entry because of its size limits
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl CacheError {
    /// Whether the failure is a transient infrastructure problem
    ///
    /// Transient failures are the ones the query path degrades around.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CacheError::StoreUnavailable(_) | CacheError::Timeout { .. }
        )
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}
