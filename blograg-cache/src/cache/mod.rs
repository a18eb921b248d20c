//! # Question Answer Caching
//!
//! Two cache layers sit in front of answer synthesis:
//!
//! - **Exact match**: `exact_cache:{document}:{hash}` keys in a [`KeyValueStore`],
//!   where the hash is taken over the normalized question. Entries expire after
//!   a fixed TTL (two hours by default).
//! - **Semantic**: per-document embeddings of answered questions. A lookup
//!   returns the nearest neighbor's answer when it is close enough.
//!
//! The same key/value store also carries the generation locks
//! (see [`crate::lock`]), so one store instance is shared by the exact cache
//! and the lock coordinator.
//!
//! ## Example
//!
//! ```rust
//! use blograg_cache::cache::{CacheConfig, ExactCache, MemoryStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let config = CacheConfig::builder()
//!     .answer_ttl(Duration::from_secs(7200))
//!     .max_entries(10_000)
//!     .build();
//!
//! let store = Arc::new(MemoryStore::new(config.clone()));
//! let cache = ExactCache::new(store, &config);
//!
//! cache.put("blog-1", "What is the topic of this blog?", "Async Rust").await;
//! assert_eq!(cache.get("blog-1", "topic?").await.as_deref(), Some("Async Rust"));
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod exact;
pub mod invalidation;
pub mod keys;
pub mod kv;
pub mod layers;
pub mod semantic;
pub mod store;
pub mod types;

pub use config::{CacheConfig, CacheConfigBuilder, LockConfig, SemanticCacheConfig};
pub use entry::StoreEntry;
pub use exact::ExactCache;
pub use invalidation::{InvalidationEvent, InvalidationReason};
pub use keys::{exact_key, lock_key, CacheKeyBuilder, KeyKind};
pub use kv::KeyValueStore;
pub use layers::{LayeredHit, QueryCache};
pub use semantic::{MemorySemanticIndex, SemanticCache, SemanticIndex, SemanticMatch};
pub use store::{start_auto_cleanup, MemoryStore};
pub use types::{CacheKey, CacheLayer, CacheStats, CacheValue};
