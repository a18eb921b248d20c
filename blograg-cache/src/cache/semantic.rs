//! Semantic answer cache
//!
//! Catches paraphrases the exact cache misses: every answered question is
//! stored with its embedding in a per-document namespace, and a new question
//! reuses the answer of its nearest neighbor when the cosine distance is below
//! the configured threshold.
//!
//! The namespace storage sits behind [`SemanticIndex`] so any vector index can
//! back it. [`MemorySemanticIndex`] keeps at most
//! `max_entries_per_document` pairs per document, evicting the least recently
//! used pair (a hit refreshes it), and optionally drops pairs older than
//! `max_age`.

use crate::cache::{config::SemanticCacheConfig, types::CacheLayer};
use crate::error::Result;
use crate::similarity::cosine_distance;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Nearest stored question for a lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    /// The stored question text
    pub question: String,

    /// The answer produced for it
    pub answer: String,

    /// Cosine distance between the lookup and stored embeddings
    pub distance: f32,
}

/// Per-document vector index of answered questions
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Nearest stored question in the document's namespace, if any
    async fn nearest(&self, document_id: &str, embedding: &[f32]) -> Result<Option<SemanticMatch>>;

    /// Append a question/answer pair keyed by the question embedding
    async fn append(
        &self,
        document_id: &str,
        question: &str,
        answer: &str,
        embedding: Vec<f32>,
    ) -> Result<()>;

    /// Drop the document's namespace; returns how many pairs were removed
    async fn drop_namespace(&self, document_id: &str) -> Result<usize>;
}

struct StoredPair {
    question: String,
    answer: String,
    embedding: Vec<f32>,
    stored_at: DateTime<Utc>,
}

/// In-process [`SemanticIndex`] with a per-document LRU capacity cap
pub struct MemorySemanticIndex {
    config: SemanticCacheConfig,
    namespaces: RwLock<HashMap<String, VecDeque<StoredPair>>>,
}

impl MemorySemanticIndex {
    /// Create an empty index
    pub fn new(config: SemanticCacheConfig) -> Self {
        Self {
            config,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored pairs for a document
    pub async fn namespace_len(&self, document_id: &str) -> usize {
        let namespaces = self.namespaces.read().await;
        namespaces.get(document_id).map(VecDeque::len).unwrap_or(0)
    }

    fn is_expired(&self, pair: &StoredPair) -> bool {
        match self.config.max_age {
            Some(max_age) => (Utc::now() - pair.stored_at)
                .to_std()
                .map(|age| age > max_age)
                .unwrap_or(false),
            None => false,
        }
    }
}

#[async_trait]
impl SemanticIndex for MemorySemanticIndex {
    async fn nearest(&self, document_id: &str, embedding: &[f32]) -> Result<Option<SemanticMatch>> {
        let mut namespaces = self.namespaces.write().await;
        let Some(pairs) = namespaces.get_mut(document_id) else {
            return Ok(None);
        };

        if self.config.max_age.is_some() {
            pairs.retain(|pair| !self.is_expired(pair));
        }

        let mut best: Option<(usize, f32)> = None;
        for (idx, pair) in pairs.iter().enumerate() {
            let Some(distance) = cosine_distance(embedding, &pair.embedding) else {
                continue;
            };
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((idx, distance)),
            }
        }

        let Some((idx, distance)) = best else {
            return Ok(None);
        };

        // Refresh the neighbor's LRU position
        let Some(pair) = pairs.remove(idx) else {
            return Ok(None);
        };
        let found = SemanticMatch {
            question: pair.question.clone(),
            answer: pair.answer.clone(),
            distance,
        };
        pairs.push_back(pair);

        Ok(Some(found))
    }

    async fn append(
        &self,
        document_id: &str,
        question: &str,
        answer: &str,
        embedding: Vec<f32>,
    ) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let pairs = namespaces.entry(document_id.to_string()).or_default();

        while pairs.len() >= self.config.max_entries_per_document {
            let Some(evicted) = pairs.pop_front() else {
                break;
            };
            debug!(
                "Evicting semantic pair for {}: {:?}",
                document_id, evicted.question
            );
        }

        pairs.push_back(StoredPair {
            question: question.to_string(),
            answer: answer.to_string(),
            embedding,
            stored_at: Utc::now(),
        });
        Ok(())
    }

    async fn drop_namespace(&self, document_id: &str) -> Result<usize> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces
            .remove(document_id)
            .map(|pairs| pairs.len())
            .unwrap_or(0))
    }
}

/// Threshold-gated semantic cache over a [`SemanticIndex`]
#[derive(Clone)]
pub struct SemanticCache {
    index: Arc<dyn SemanticIndex>,
    config: SemanticCacheConfig,
}

impl SemanticCache {
    /// Create a semantic cache over the given index
    pub fn new(index: Arc<dyn SemanticIndex>, config: SemanticCacheConfig) -> Self {
        Self { index, config }
    }

    /// Whether lookups and stores are performed
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Nearest neighbor within the threshold, reporting index failures
    pub async fn try_lookup(
        &self,
        document_id: &str,
        query_embedding: &[f32],
    ) -> Result<Option<SemanticMatch>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let nearest = self.index.nearest(document_id, query_embedding).await?;
        let hit = nearest.filter(|m| m.distance < self.config.distance_threshold);
        debug!(
            layer = %CacheLayer::Semantic,
            hit = hit.is_some(),
            "Semantic cache lookup for {}",
            document_id
        );
        Ok(hit)
    }

    /// Fail-open lookup: an index failure reads as a miss
    pub async fn lookup(&self, document_id: &str, query_embedding: &[f32]) -> Option<String> {
        match self.try_lookup(document_id, query_embedding).await {
            Ok(hit) => hit.map(|m| m.answer),
            Err(e) => {
                warn!("Semantic cache unavailable, treating as miss: {}", e);
                None
            }
        }
    }

    /// Append a pair, reporting index failures
    pub async fn try_store(
        &self,
        document_id: &str,
        question: &str,
        answer: &str,
        embedding: Vec<f32>,
    ) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        self.index.append(document_id, question, answer, embedding).await
    }

    /// Fail-open append: an index failure is logged and ignored
    pub async fn store(&self, document_id: &str, question: &str, answer: &str, embedding: Vec<f32>) {
        if let Err(e) = self.try_store(document_id, question, answer, embedding).await {
            warn!("Semantic cache write skipped: {}", e);
        }
    }

    /// Drop all stored pairs for a document
    pub async fn invalidate_document(&self, document_id: &str) -> Result<usize> {
        self.index.drop_namespace(document_id).await
    }
}
