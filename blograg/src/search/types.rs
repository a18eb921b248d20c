//! Common types for search module

use serde::{Deserialize, Serialize};

/// Chunk of a document as stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document
    pub document_id: String,
    /// Position within the document, for traceability
    pub index: usize,
    /// Chunk text
    pub text: String,
    /// Embedding of `text`
    pub embedding: Vec<f32>,
}

/// Caller-supplied chunk for questions without a document id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineChunk {
    pub text: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl InlineChunk {
    pub fn new(text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            embedding: Some(embedding),
        }
    }
}

/// Search hit with relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// Position within the document
    pub index: usize,
    /// Cosine similarity (1 - distance)
    pub score: f32,
    pub text: String,
}

/// Order hits by score descending, ties by chunk index ascending
pub fn sort_hits(hits: &mut [ScoredChunk]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
}
