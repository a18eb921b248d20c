//! Error types for the question answering pipeline

use blograg_cache::CacheError;
use thiserror::Error;

/// Errors raised by capabilities and pipeline steps
///
/// Only indexing and configuration surface these to callers; the query path
/// maps every variant to a fallback answer.
#[derive(Error, Debug)]
pub enum RagError {
    /// Embedding capability failed or returned an unusable result
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Text generation capability failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Chunk index read or write failed
    #[error("Index error: {0}")]
    Index(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure talking to a remote capability
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Cache substrate failure
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<lancedb::Error> for RagError {
    fn from(e: lancedb::Error) -> Self {
        RagError::Index(e.to_string())
    }
}

impl From<arrow_schema::ArrowError> for RagError {
    fn from(e: arrow_schema::ArrowError) -> Self {
        RagError::Index(e.to_string())
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;
