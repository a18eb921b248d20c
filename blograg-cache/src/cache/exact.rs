//! Exact-match answer cache
//!
//! Answers are keyed by the hash of the normalized question, scoped to the
//! document they were produced from, and expire after a fixed TTL. The typed
//! `lookup`/`store` calls report store failures; `get`/`put` fail open.

use crate::cache::{config::CacheConfig, keys, kv::KeyValueStore, types::CacheLayer};
use crate::error::Result;
use crate::normalize::normalized_hash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Document-scoped answer cache on top of a [`KeyValueStore`]
#[derive(Clone)]
pub struct ExactCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ExactCache {
    /// Create an exact cache writing entries with the configured TTL
    pub fn new(store: Arc<dyn KeyValueStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.answer_ttl,
        }
    }

    /// TTL applied to every write
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up an answer by precomputed question hash
    pub async fn lookup(&self, document_id: &str, question_hash: &str) -> Result<Option<String>> {
        let key = keys::exact_key(document_id, question_hash);
        let answer = self.store.get(&key).await?;
        debug!(
            layer = %CacheLayer::ExactMatch,
            hit = answer.is_some(),
            "Exact cache lookup for {}",
            key
        );
        Ok(answer)
    }

    /// Store an answer by precomputed question hash, replacing any previous one
    pub async fn store(&self, document_id: &str, question_hash: &str, answer: &str) -> Result<()> {
        let key = keys::exact_key(document_id, question_hash);
        self.store.set_ex(&key, answer.to_string(), self.ttl).await
    }

    /// Fail-open lookup: a store failure reads as a miss
    pub async fn get(&self, document_id: &str, question: &str) -> Option<String> {
        let (_, hash) = normalized_hash(question);
        match self.lookup(document_id, &hash).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Exact cache unavailable, treating as miss: {}", e);
                None
            }
        }
    }

    /// Fail-open write: a store failure is logged and ignored
    pub async fn put(&self, document_id: &str, question: &str, answer: &str) {
        let (_, hash) = normalized_hash(question);
        if let Err(e) = self.store(document_id, &hash, answer).await {
            warn!("Exact cache write skipped: {}", e);
        }
    }

    /// Remove every cached answer for a document
    pub async fn invalidate_document(&self, document_id: &str) -> Result<usize> {
        let prefix = keys::CacheKeyBuilder::new(keys::KeyKind::ExactAnswer, document_id).prefix();
        self.store.delete_prefix(&prefix).await
    }
}
