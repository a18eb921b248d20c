//! Integration tests for the cache layers
//!
//! These tests exercise the public API the query path uses:
//! - Exact cache keyed by normalized questions
//! - TTL expiry and LRU eviction in the shared store
//! - Semantic cache thresholds and per-document namespaces
//! - Document invalidation across both layers

use blograg_cache::cache::{
    CacheConfig, ExactCache, KeyValueStore, MemorySemanticIndex, MemoryStore, QueryCache,
    SemanticCache, SemanticCacheConfig,
};
use blograg_cache::{normalize, normalized_hash, CacheLayer};
use std::sync::Arc;
use std::time::Duration;

fn query_cache(config: CacheConfig) -> (QueryCache, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new(config.clone()));
    let exact = ExactCache::new(store.clone(), &config);
    let semantic_config = SemanticCacheConfig::default();
    let semantic = SemanticCache::new(
        Arc::new(MemorySemanticIndex::new(semantic_config.clone())),
        semantic_config,
    );
    (QueryCache::new(exact, semantic), store)
}

#[test]
fn test_filler_phrasings_share_a_key() {
    assert_eq!(normalize("What is the topic of this blog?"), normalize("topic?"));
    assert_eq!(normalize("Tell me about the author."), normalize("author"));
    assert_eq!(normalize("Summarize this article!"), "");

    let once = normalize("Explain, in detail, the post's main argument");
    assert_eq!(normalize(&once), once);
}

#[tokio::test]
async fn test_exact_cache_round_trip_until_ttl() {
    let config = CacheConfig::builder()
        .answer_ttl(Duration::from_millis(100))
        .ttl_jitter(0.0)
        .build();
    let (cache, _) = query_cache(config);

    cache.exact().put("blog-1", "What is the topic of this blog?", "Rust").await;
    assert_eq!(cache.exact().get("blog-1", "topic?").await, Some("Rust".to_string()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.exact().get("blog-1", "topic?").await, None);
}

#[tokio::test]
async fn test_store_key_layout_is_shared() {
    let (cache, store) = query_cache(CacheConfig::default());
    let (_, hash) = normalized_hash("Who is the author?");

    cache.exact().put("blog-7", "Who is the author?", "Ada").await;

    let raw = store.get(&format!("exact_cache:blog-7:{}", hash)).await.unwrap();
    assert_eq!(raw, Some("Ada".to_string()));
}

#[tokio::test]
async fn test_lru_eviction_in_shared_store() {
    let config = CacheConfig::builder()
        .answer_ttl(Duration::from_secs(300))
        .max_entries(3)
        .refresh_on_read(true)
        .build();
    let (cache, store) = query_cache(config);
    let exact = cache.exact();

    exact.put("doc", "first question", "1").await;
    exact.put("doc", "second question", "2").await;
    exact.put("doc", "third question", "3").await;

    // Access second and third to make them more recent
    assert!(exact.get("doc", "second question").await.is_some());
    assert!(exact.get("doc", "third question").await.is_some());

    exact.put("doc", "fourth question", "4").await;

    assert!(exact.get("doc", "first question").await.is_none());
    assert!(exact.get("doc", "fourth question").await.is_some());
    assert_eq!(store.stats().await.evicted, 1);
}

#[tokio::test]
async fn test_layered_lookup_order() {
    let (cache, _) = query_cache(CacheConfig::default());
    let (_, hash) = normalized_hash("When was it published?");
    let (_, paraphrase) = normalized_hash("Publication date?");

    cache
        .store_answer("doc", &hash, "When was it published?", "2024", Some(vec![0.9, 0.1, 0.0]))
        .await;

    let exact = cache.lookup_exact("doc", &hash).await.unwrap();
    assert_eq!(exact.layer, CacheLayer::ExactMatch);

    assert!(cache.lookup_exact("doc", &paraphrase).await.is_none());
    let semantic = cache
        .lookup_semantic("doc", &paraphrase, &[0.88, 0.12, 0.0])
        .await
        .unwrap();
    assert_eq!(semantic.layer, CacheLayer::Semantic);
    assert_eq!(semantic.answer, "2024");

    // Unrelated question embedding stays a miss
    assert!(cache.lookup_semantic("doc", &paraphrase, &[0.0, 0.0, 1.0]).await.is_none());
}

#[tokio::test]
async fn test_document_invalidation_is_scoped() {
    let (cache, store) = query_cache(CacheConfig::default());
    let (_, hash) = normalized_hash("topic?");

    cache.store_answer("a", &hash, "topic?", "old", Some(vec![1.0, 0.0])).await;
    cache.store_answer("b", &hash, "topic?", "kept", Some(vec![1.0, 0.0])).await;

    let event = cache.invalidate_document("a").await.unwrap();
    assert_eq!(event.removed, 2);
    assert_eq!(store.stats().await.deleted, 1);

    assert!(cache.lookup_exact("a", &hash).await.is_none());
    assert_eq!(cache.lookup_exact("b", &hash).await.unwrap().answer, "kept");
}

#[tokio::test]
async fn test_concurrent_cache_access() {
    let (cache, store) = query_cache(CacheConfig::default());

    let mut handles = vec![];
    for i in 0..10 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..10 {
                let question = format!("question number {} {}", i, j);
                let answer = format!("answer {} {}", i, j);
                cache.exact().put("doc", &question, &answer).await;
                assert_eq!(cache.exact().get("doc", &question).await, Some(answer));
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    let stats = store.stats().await;
    assert_eq!(stats.keys, 100);
    assert_eq!(stats.hits, 100);
}
