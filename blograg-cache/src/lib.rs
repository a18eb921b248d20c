//! # blograg-cache
//!
//! Caching and concurrency coordination for retrieval-augmented question
//! answering over blog posts.
//!
//! ## Features
//!
//! - Question normalization into stable, document-scoped cache keys
//! - Exact-match answer cache with TTL expiry
//! - Semantic answer cache keyed by question embeddings
//! - Per-question generation lock with a bounded wait protocol
//! - Fail-open behavior: an unreachable store degrades to a miss
//!
//! ## Query path
//!
//! ```no_run
//! use blograg_cache::{
//!     lock_key, normalized_hash, CacheConfig, Coordination, ExactCache, LockConfig,
//!     LockCoordinator, MemoryStore,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CacheConfig::default();
//!     let store = Arc::new(MemoryStore::new(config.clone()));
//!     let exact = ExactCache::new(store.clone(), &config);
//!     let locks = LockCoordinator::new(store, LockConfig::default());
//!
//!     let (_, hash) = normalized_hash("Who wrote this post?");
//!     if let Some(answer) = exact.lookup("blog-1", &hash).await.ok().flatten() {
//!         println!("{}", answer);
//!         return;
//!     }
//!
//!     let key = lock_key("blog-1", &hash);
//!     let outcome = locks
//!         .wait_or_acquire(&key, || {
//!             let exact = exact.clone();
//!             let hash = hash.clone();
//!             async move { exact.lookup("blog-1", &hash).await.ok().flatten() }
//!         })
//!         .await;
//!
//!     match outcome {
//!         Coordination::Answered(answer) => println!("{}", answer),
//!         Coordination::Owner(guard) => {
//!             exact.store("blog-1", &hash, "Ada Lovelace").await.ok();
//!             guard.release().await;
//!         }
//!         Coordination::Contended | Coordination::Bypassed => {
//!             // synthesize without the lock
//!         }
//!     }
//! }
//! ```

pub mod cache;
pub mod error;
pub mod lock;
pub mod normalize;
pub mod similarity;

// Re-export main types for convenience
pub use cache::{
    exact_key, lock_key, CacheConfig, CacheConfigBuilder, CacheLayer, CacheStats, ExactCache,
    InvalidationEvent, InvalidationReason, KeyValueStore, LayeredHit, LockConfig,
    MemorySemanticIndex, MemoryStore, QueryCache, SemanticCache, SemanticCacheConfig,
    SemanticIndex, SemanticMatch,
};
pub use error::{CacheError, Result};
pub use lock::{Coordination, LockCoordinator, LockGuard};
pub use normalize::{normalize, normalized_hash, question_hash};
