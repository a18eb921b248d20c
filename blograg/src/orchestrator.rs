//! Query orchestration
//!
//! A question moves through these steps, stopping at the first that yields
//! an answer:
//!
//! 1. canned reply for small talk
//! 2. exact cache
//! 3. generation lock (waiting may yield the answer of a sibling request)
//! 4. semantic cache
//! 5. retrieval and synthesis, then writes to both caches
//!
//! The lock is released on every path out of step 5. Questions without a
//! document skip caching and locking and are answered from caller-supplied
//! inline chunks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use blograg_cache::{
    cache::start_auto_cleanup, lock_key, normalized_hash, CacheConfig, Coordination, ExactCache,
    KeyValueStore, LockConfig, LockCoordinator, MemorySemanticIndex, MemoryStore, QueryCache,
    SemanticCache, SemanticCacheConfig, SemanticIndex,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::config::{config_error, Settings};
use crate::error::Result;
use crate::llm::TextGenerator;
use crate::search::{ChunkIndex, ChunkingConfig, Embedder, InlineChunk, TextChunker, VectorRetriever};
use crate::synth::{canned_response, AnswerSynthesizer, DEGRADED, NO_INFORMATION};

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Canned,
    ExactCache,
    /// Produced by a concurrent request while this one waited on the lock
    Sibling,
    SemanticCache,
    Synthesized,
    NoInformation,
    /// An upstream capability failed; the text is an apology
    Degraded,
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AnswerSource::Canned => "canned",
            AnswerSource::ExactCache => "exact_cache",
            AnswerSource::Sibling => "sibling",
            AnswerSource::SemanticCache => "semantic_cache",
            AnswerSource::Synthesized => "synthesized",
            AnswerSource::NoInformation => "no_information",
            AnswerSource::Degraded => "degraded",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
}

impl Answer {
    fn new(text: impl Into<String>, source: AnswerSource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// Answers served per source since startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub canned: u64,
    pub exact_hits: u64,
    pub sibling_hits: u64,
    pub semantic_hits: u64,
    pub synthesized: u64,
    pub no_information: u64,
    pub degraded: u64,
}

impl QueryStats {
    pub fn total(&self) -> u64 {
        self.canned
            + self.exact_hits
            + self.sibling_hits
            + self.semantic_hits
            + self.synthesized
            + self.no_information
            + self.degraded
    }

    /// Share of answers served without synthesis
    pub fn cache_hit_rate(&self) -> f64 {
        let cached = self.exact_hits + self.sibling_hits + self.semantic_hits;
        let eligible = cached + self.synthesized;
        if eligible == 0 {
            0.0
        } else {
            cached as f64 / eligible as f64
        }
    }
}

#[derive(Default)]
struct QueryCounters {
    canned: AtomicU64,
    exact_hits: AtomicU64,
    sibling_hits: AtomicU64,
    semantic_hits: AtomicU64,
    synthesized: AtomicU64,
    no_information: AtomicU64,
    degraded: AtomicU64,
}

impl QueryCounters {
    fn record(&self, source: AnswerSource) {
        let counter = match source {
            AnswerSource::Canned => &self.canned,
            AnswerSource::ExactCache => &self.exact_hits,
            AnswerSource::Sibling => &self.sibling_hits,
            AnswerSource::SemanticCache => &self.semantic_hits,
            AnswerSource::Synthesized => &self.synthesized,
            AnswerSource::NoInformation => &self.no_information,
            AnswerSource::Degraded => &self.degraded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> QueryStats {
        QueryStats {
            canned: self.canned.load(Ordering::Relaxed),
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            sibling_hits: self.sibling_hits.load(Ordering::Relaxed),
            semantic_hits: self.semantic_hits.load(Ordering::Relaxed),
            synthesized: self.synthesized.load(Ordering::Relaxed),
            no_information: self.no_information.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub cache: CacheConfig,
    pub lock: LockConfig,
    pub semantic: SemanticCacheConfig,
    pub chunking: ChunkingConfig,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Drop a document's cached answers when it is re-indexed
    pub invalidate_on_reindex: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            lock: LockConfig::default(),
            semantic: SemanticCacheConfig::default(),
            chunking: ChunkingConfig::default(),
            top_k: 8,
            invalidate_on_reindex: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cache: settings.cache_config(),
            lock: settings.lock_config(),
            semantic: settings.semantic_config(),
            chunking: settings.chunking(),
            top_k: settings.top_k,
            invalidate_on_reindex: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.cache.validate().map_err(config_error)?;
        self.lock.validate().map_err(config_error)?;
        self.semantic.validate().map_err(config_error)?;
        self.chunking.validate()?;
        Ok(())
    }
}

pub struct QueryOrchestrator {
    cache: QueryCache,
    locks: LockCoordinator,
    retriever: VectorRetriever,
    synthesizer: AnswerSynthesizer,
    invalidate_on_reindex: bool,
    counters: Arc<QueryCounters>,
    /// Expiry sweep of the in-process store, aborted on drop
    cleanup: Option<JoinHandle<()>>,
}

impl QueryOrchestrator {
    pub fn new(
        cache: QueryCache,
        locks: LockCoordinator,
        retriever: VectorRetriever,
        synthesizer: AnswerSynthesizer,
        invalidate_on_reindex: bool,
    ) -> Self {
        Self {
            cache,
            locks,
            retriever,
            synthesizer,
            invalidate_on_reindex,
            counters: Arc::new(QueryCounters::default()),
            cleanup: None,
        }
    }

    /// Wire all components over the given cache substrates
    pub fn with_stores(
        config: OrchestratorConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        index: Arc<dyn ChunkIndex>,
        store: Arc<dyn KeyValueStore>,
        semantic_index: Arc<dyn SemanticIndex>,
    ) -> Result<Self> {
        config.validate()?;

        let exact = ExactCache::new(store.clone(), &config.cache);
        let semantic = SemanticCache::new(semantic_index, config.semantic.clone());
        let locks = LockCoordinator::new(store, config.lock.clone());
        let retriever = VectorRetriever::new(
            embedder,
            index,
            TextChunker::new(config.chunking)?,
            config.top_k,
        );

        Ok(Self::new(
            QueryCache::new(exact, semantic),
            locks,
            retriever,
            AnswerSynthesizer::new(generator),
            config.invalidate_on_reindex,
        ))
    }

    /// Wire all components over in-process caches
    ///
    /// Starts the expiry sweep when enabled and a runtime is available.
    pub fn in_memory(
        config: OrchestratorConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        index: Arc<dyn ChunkIndex>,
    ) -> Result<Self> {
        let auto_cleanup = config.cache.enable_auto_cleanup;
        let store = Arc::new(MemoryStore::new(config.cache.clone()));
        let semantic_index = Arc::new(MemorySemanticIndex::new(config.semantic.clone()));

        let mut orchestrator =
            Self::with_stores(config, embedder, generator, index, store.clone(), semantic_index)?;
        if auto_cleanup {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                orchestrator.cleanup = Some(handle.spawn(start_auto_cleanup(store)));
            }
        }
        Ok(orchestrator)
    }

    pub fn stats(&self) -> QueryStats {
        self.counters.snapshot()
    }

    pub fn retriever(&self) -> &VectorRetriever {
        &self.retriever
    }

    /// Index a post, replacing its chunks; returns the chunk count
    pub async fn index_document(&self, document_id: &str, full_text: &str) -> Result<usize> {
        let count = self.retriever.index_document(document_id, full_text).await?;

        if self.invalidate_on_reindex {
            match self.cache.invalidate_document(document_id).await {
                Ok(event) => info!("Cached answers invalidated, {}", event),
                Err(e) => warn!("Could not invalidate cached answers for {}: {}", document_id, e),
            }
        }

        Ok(count)
    }

    /// Answer a question, returning only the text
    pub async fn answer_question(
        &self,
        document_id: Option<&str>,
        question: &str,
        inline: Option<&[InlineChunk]>,
    ) -> String {
        self.answer(document_id, question, inline).await.text
    }

    /// Answer a question about a document, or about inline chunks when there is no document
    pub async fn answer(
        &self,
        document_id: Option<&str>,
        question: &str,
        inline: Option<&[InlineChunk]>,
    ) -> Answer {
        let document_id = document_id.map(str::trim).filter(|d| !d.is_empty());
        let span = info_span!(
            "query",
            request_id = %Uuid::new_v4(),
            document = document_id.unwrap_or("-"),
            hash = field::Empty,
        );

        let answer = self
            .route(document_id, question, inline.unwrap_or(&[]))
            .instrument(span)
            .await;
        self.counters.record(answer.source);
        answer
    }

    async fn route(&self, document_id: Option<&str>, question: &str, inline: &[InlineChunk]) -> Answer {
        if let Some(reply) = canned_response(question) {
            return Answer::new(reply, AnswerSource::Canned);
        }

        let answer = match document_id {
            Some(document_id) => self.answer_document(document_id, question, inline).await,
            None if !inline.is_empty() => self.answer_inline(question, inline).await,
            None => Answer::new(NO_INFORMATION, AnswerSource::NoInformation),
        };

        info!(source = %answer.source, "Answered");
        answer
    }

    async fn answer_document(&self, document_id: &str, question: &str, inline: &[InlineChunk]) -> Answer {
        let (_, hash) = normalized_hash(question);
        Span::current().record("hash", &hash[..12]);

        if let Some(hit) = self.cache.lookup_exact(document_id, &hash).await {
            return Answer::new(hit.answer, AnswerSource::ExactCache);
        }

        let key = lock_key(document_id, &hash);
        let coordination = self
            .locks
            .wait_or_acquire(&key, || {
                let cache = self.cache.clone();
                let document_id = document_id.to_string();
                let hash = hash.clone();
                async move { cache.lookup_exact(&document_id, &hash).await.map(|hit| hit.answer) }
            })
            .await;

        let guard = match coordination {
            Coordination::Answered(answer) => return Answer::new(answer, AnswerSource::Sibling),
            Coordination::Owner(guard) => Some(guard),
            Coordination::Contended | Coordination::Bypassed => None,
        };

        let answer = self.generate(document_id, &hash, question, inline).await;

        if let Some(guard) = guard {
            guard.release().await;
        }
        answer
    }

    /// Semantic cache, then retrieval and synthesis, then cache writes
    async fn generate(&self, document_id: &str, hash: &str, question: &str, inline: &[InlineChunk]) -> Answer {
        let embedding = match self.retriever.embedder().embed_one(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Question embedding failed: {}", e);
                return Answer::new(DEGRADED, AnswerSource::Degraded);
            }
        };

        if let Some(hit) = self.cache.lookup_semantic(document_id, hash, &embedding).await {
            return Answer::new(hit.answer, AnswerSource::SemanticCache);
        }

        let mut context = match self.retriever.retrieve(document_id, &embedding).await {
            Ok(context) => context,
            Err(e) if !inline.is_empty() => {
                warn!("Retrieval failed, using inline chunks: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                return Answer::new(DEGRADED, AnswerSource::Degraded);
            }
        };
        if context.is_empty() && !inline.is_empty() {
            context = self.retriever.rank_inline(&embedding, inline);
        }

        let answer = match self.synthesizer.synthesize(question, &context).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Answer synthesis failed: {}", e);
                return Answer::new(DEGRADED, AnswerSource::Degraded);
            }
        };

        // Nothing indexed yet: do not pin the not-found reply in the caches
        if !context.is_empty() {
            self.cache
                .store_answer(document_id, hash, question, &answer, Some(embedding))
                .await;
        }

        Answer::new(answer, AnswerSource::Synthesized)
    }

    async fn answer_inline(&self, question: &str, inline: &[InlineChunk]) -> Answer {
        let embedding = match self.retriever.embedder().embed_one(question).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("Question embedding failed: {}", e);
                return Answer::new(DEGRADED, AnswerSource::Degraded);
            }
        };

        let context = self.retriever.rank_inline(&embedding, inline);
        match self.synthesizer.synthesize(question, &context).await {
            Ok(answer) => Answer::new(answer, AnswerSource::Synthesized),
            Err(e) => {
                warn!("Answer synthesis failed: {}", e);
                Answer::new(DEGRADED, AnswerSource::Degraded)
            }
        }
    }
}

impl Drop for QueryOrchestrator {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            debug!("Stopping store expiry sweep");
            cleanup.abort();
        }
    }
}
