//! Capability doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blograg::{
    Embedder, MemoryChunkIndex, OrchestratorConfig, QueryOrchestrator, RagError, Result,
    TextGenerator, NOT_FOUND,
};
use blograg_cache::{CacheConfig, CacheError, KeyValueStore, LockConfig};

/// Deterministic bag-of-words embedder
///
/// Each lowercase alphanumeric word adds 1.0 to a hashed bucket, so texts that
/// share most of their words are close in cosine distance.
pub struct BagOfWordsEmbedder {
    dimension: usize,
    pub calls: AtomicUsize,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 256,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for word in words(text) {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.dimension] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Embedder whose backend is down
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_one(&self, _: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding("embedding service unavailable".into()))
    }

    async fn embed_many(&self, _: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("embedding service unavailable".into()))
    }
}

/// Generator that answers only from passages sharing a word with the question
///
/// Counts calls, records prompts, can be slowed down and can fail its first
/// `failures` calls.
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, String)>>,
    delay: Duration,
    failures: AtomicUsize,
}

impl CountingGenerator {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(failures: usize) -> Self {
        let generator = Self::new();
        generator.failures.store(failures, Ordering::SeqCst);
        generator
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RagError::Generation("upstream returned 503".into()));
        }

        let (context, question) = user.split_once("\n\nQuestion: ").unwrap_or((user, ""));
        let context = context.trim_start_matches("Blog context:\n");
        let keywords: Vec<String> = words(question).filter(|w| w.len() > 3).collect();

        let grounded = context
            .split("\n\n")
            .find(|passage| words(passage).any(|w| keywords.contains(&w)));

        Ok(match grounded {
            Some(passage) => {
                let excerpt: String = passage.chars().take(60).collect();
                format!("According to the blog: {}", excerpt)
            }
            None => NOT_FOUND.to_string(),
        })
    }
}

/// Key/value store that refuses every call
pub struct UnreachableStore;

#[async_trait]
impl KeyValueStore for UnreachableStore {
    async fn get(&self, _: &str) -> blograg_cache::Result<Option<String>> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
    async fn set_ex(&self, _: &str, _: String, _: Duration) -> blograg_cache::Result<()> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
    async fn set_nx_ex(&self, _: &str, _: String, _: Duration) -> blograg_cache::Result<bool> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
    async fn delete(&self, _: &str) -> blograg_cache::Result<bool> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
    async fn exists(&self, _: &str) -> blograg_cache::Result<bool> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
    async fn delete_prefix(&self, _: &str) -> blograg_cache::Result<usize> {
        Err(CacheError::StoreUnavailable("connection refused".into()))
    }
}

pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Orchestrator config with short lock polling and no background sweeps
pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        cache: CacheConfig::ephemeral(Duration::from_secs(600)),
        lock: LockConfig {
            enabled: true,
            lock_ttl: Duration::from_secs(10),
            poll_interval: Duration::from_millis(10),
            max_polls: 200,
            acquire_attempts: 2,
        },
        ..OrchestratorConfig::default()
    }
}

pub struct Harness {
    pub orch: QueryOrchestrator,
    pub embedder: Arc<BagOfWordsEmbedder>,
    pub generator: Arc<CountingGenerator>,
    pub index: Arc<MemoryChunkIndex>,
}

pub fn harness(generator: CountingGenerator) -> Harness {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let generator = Arc::new(generator);
    let index = Arc::new(MemoryChunkIndex::new());
    let orch = QueryOrchestrator::in_memory(
        test_config(),
        embedder.clone(),
        generator.clone(),
        index.clone(),
    )
    .unwrap();

    Harness {
        orch,
        embedder,
        generator,
        index,
    }
}

/// About 3000 characters of blog text in paragraphs
pub fn sample_post() -> String {
    let paragraphs = [
        "Rust guarantees memory safety through its ownership model. Every value has a single owner, and the value is dropped when the owner goes out of scope.",
        "Borrowing lets code use a value without taking ownership. Shared references allow reading, while a mutable reference grants exclusive write access.",
        "Async Rust builds on futures. A future does nothing until it is polled, and runtimes such as tokio drive many futures concurrently on a thread pool.",
        "Lifetimes describe how long references stay valid. The compiler infers most of them, and explicit annotations are needed only when inference is ambiguous.",
        "Cargo manages dependencies and builds. Workspaces group several crates that share one lock file and one target directory.",
    ];

    let mut post = String::new();
    let mut i = 0;
    while post.len() < 3000 {
        post.push_str(paragraphs[i % paragraphs.len()]);
        post.push_str("\n\n");
        i += 1;
    }
    post
}
