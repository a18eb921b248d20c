//! Exact and semantic layers behind one handle

use crate::cache::{
    exact::ExactCache,
    invalidation::{InvalidationEvent, InvalidationReason},
    semantic::SemanticCache,
    types::CacheLayer,
};
use crate::error::Result;
use tracing::{debug, warn};

/// Answer found in one of the cache layers
#[derive(Debug, Clone, PartialEq)]
pub struct LayeredHit {
    /// Layer that produced the answer
    pub layer: CacheLayer,

    /// Cached answer text
    pub answer: String,
}

/// Both answer cache layers for the query path
#[derive(Clone)]
pub struct QueryCache {
    exact: ExactCache,
    semantic: SemanticCache,
}

impl QueryCache {
    pub fn new(exact: ExactCache, semantic: SemanticCache) -> Self {
        Self { exact, semantic }
    }

    pub fn exact(&self) -> &ExactCache {
        &self.exact
    }

    pub fn semantic(&self) -> &SemanticCache {
        &self.semantic
    }

    /// Fail-open exact lookup by question hash
    pub async fn lookup_exact(&self, document_id: &str, question_hash: &str) -> Option<LayeredHit> {
        match self.exact.lookup(document_id, question_hash).await {
            Ok(answer) => answer.map(|answer| LayeredHit {
                layer: CacheLayer::ExactMatch,
                answer,
            }),
            Err(e) => {
                warn!("Exact cache unavailable, treating as miss: {}", e);
                None
            }
        }
    }

    /// Fail-open semantic lookup; a hit is copied into the exact layer
    pub async fn lookup_semantic(
        &self,
        document_id: &str,
        question_hash: &str,
        embedding: &[f32],
    ) -> Option<LayeredHit> {
        let answer = self.semantic.lookup(document_id, embedding).await?;
        self.store_exact(document_id, question_hash, &answer).await;
        Some(LayeredHit {
            layer: CacheLayer::Semantic,
            answer,
        })
    }

    /// Fail-open exact write
    pub async fn store_exact(&self, document_id: &str, question_hash: &str, answer: &str) {
        if let Err(e) = self.exact.store(document_id, question_hash, answer).await {
            warn!("Exact cache write skipped: {}", e);
        }
    }

    /// Write a fresh answer to both layers
    pub async fn store_answer(
        &self,
        document_id: &str,
        question_hash: &str,
        question: &str,
        answer: &str,
        embedding: Option<Vec<f32>>,
    ) {
        self.store_exact(document_id, question_hash, answer).await;
        if let Some(embedding) = embedding {
            self.semantic.store(document_id, question, answer, embedding).await;
        }
    }

    /// Drop every cached answer for a document from both layers
    pub async fn invalidate_document(&self, document_id: &str) -> Result<InvalidationEvent> {
        let exact = self.exact.invalidate_document(document_id).await?;
        let semantic = self.semantic.invalidate_document(document_id).await?;
        debug!("Dropped {} exact and {} semantic answers for {}", exact, semantic, document_id);

        Ok(InvalidationEvent::new(
            InvalidationReason::Reindexed {
                document_id: document_id.to_string(),
            },
            exact + semantic,
        )
        .with_detail(format!("exact={} semantic={}", exact, semantic)))
    }
}
