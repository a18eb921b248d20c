//! Retrieval over indexed blog posts
//!
//! [`VectorRetriever`] owns the indexing side (chunk, embed, replace) and the
//! query side (top-k chunks of one document, or ranking of caller-supplied
//! inline chunks when there is no document).

use std::sync::Arc;

use blograg_cache::similarity::rank_descending_by_cosine;
use tracing::{debug, info};

use super::chunker::TextChunker;
use super::embedding::Embedder;
use super::types::{Chunk, InlineChunk, ScoredChunk};
use super::vector::ChunkIndex;
use crate::error::{RagError, Result};

/// Chunk-level retriever for blog posts
#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn ChunkIndex>,
    chunker: TextChunker,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn ChunkIndex>,
        chunker: TextChunker,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            chunker,
            top_k,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk, embed and store a post, replacing its previous chunks
    pub async fn index_document(&self, document_id: &str, full_text: &str) -> Result<usize> {
        let pieces = self.chunker.split(full_text);
        if pieces.is_empty() {
            info!("No content to index for {}, clearing its chunks", document_id);
            return self.index.replace_document(document_id, Vec::new()).await;
        }

        let embeddings = self.embedder.embed_many(&pieces).await?;
        if embeddings.len() != pieces.len() {
            return Err(RagError::Embedding(format!(
                "expected {} embeddings, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<Chunk> = pieces
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| Chunk {
                document_id: document_id.to_string(),
                index,
                text,
                embedding,
            })
            .collect();

        let count = self.index.replace_document(document_id, chunks).await?;
        info!("Indexed {} chunks for {}", count, document_id);
        Ok(count)
    }

    /// Top-k chunks of a document
    pub async fn search(&self, document_id: &str, query_embedding: &[f32]) -> Result<Vec<ScoredChunk>> {
        let hits = self.index.search(document_id, query_embedding, self.top_k).await?;
        debug!("Retrieved {} chunks for {}", hits.len(), document_id);
        Ok(hits)
    }

    /// Top-k chunk texts of a document, best first
    pub async fn retrieve(&self, document_id: &str, query_embedding: &[f32]) -> Result<Vec<String>> {
        Ok(self
            .search(document_id, query_embedding)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Rank caller-supplied chunks by similarity to the question
    pub fn rank_inline(&self, query_embedding: &[f32], chunks: &[InlineChunk]) -> Vec<String> {
        rank_inline(query_embedding, chunks, self.top_k)
    }

    pub async fn chunk_count(&self, document_id: &str) -> Result<usize> {
        self.index.count(document_id).await
    }
}

/// Top `limit` inline chunk texts; chunks without a usable embedding are skipped
pub fn rank_inline(query_embedding: &[f32], chunks: &[InlineChunk], limit: usize) -> Vec<String> {
    let usable: Vec<&InlineChunk> = chunks
        .iter()
        .filter(|c| {
            c.embedding
                .as_ref()
                .is_some_and(|e| !e.is_empty() && e.len() == query_embedding.len())
        })
        .collect();

    rank_descending_by_cosine(
        query_embedding,
        usable.iter().filter_map(|c| c.embedding.as_deref()),
    )
    .into_iter()
    .take(limit)
    .map(|(pos, _)| usable[pos].text.clone())
    .collect()
}
