//! In-process key/value store with per-key TTL and bounded size

use crate::cache::{
    config::CacheConfig,
    entry::StoreEntry,
    invalidation::{InvalidationEvent, InvalidationReason},
    keys::KeyKind,
    kv::KeyValueStore,
    types::{CacheKey, CacheStats, CacheValue},
};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// [`KeyValueStore`] held in process memory
///
/// One instance is shared by every request of the process, carrying both the
/// exact answers and the generation locks. All mutations run under a single
/// write guard, which is what makes `set_nx_ex` atomic. When the entry or byte
/// limit is reached the least recently used answer is evicted. Generation
/// locks are never evicted; they leave only by delete or expiry.
pub struct MemoryStore {
    pub(crate) config: CacheConfig,
    state: Arc<RwLock<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<CacheKey, StoreEntry>,
    /// Front is least recently used
    recency: VecDeque<CacheKey>,
    bytes: usize,
    stats: CacheStats,
}

impl StoreState {
    fn remove(&mut self, key: &str) -> Option<StoreEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.retain(|k| k != key);
        self.bytes = self.bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn touch(&mut self, key: &str) {
        self.recency.retain(|k| k != key);
        self.recency.push_back(key.to_string());
    }

    /// Drop `key` if it has expired; returns whether it was dropped
    fn purge_if_expired(&mut self, key: &str) -> bool {
        let expired = self.entries.get(key).is_some_and(StoreEntry::is_expired);
        if expired {
            debug!("Store key expired: {}", key);
            self.remove(key);
            self.stats.expired += 1;
        }
        expired
    }

    /// Least recently used key that may be evicted
    fn eviction_candidate(&self) -> Option<CacheKey> {
        self.recency
            .iter()
            .find(|key| KeyKind::of(key) != Some(KeyKind::GenerationLock))
            .cloned()
    }

    fn sync_gauges(&mut self) {
        self.stats.keys = self.entries.len();
        self.stats.bytes = self.bytes;
    }
}

impl MemoryStore {
    pub fn new(config: CacheConfig) -> Self {
        info!(
            "Initializing in-memory store (max {} keys, {} bytes)",
            config.max_entries, config.max_bytes
        );
        Self {
            config,
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.state.read().await.stats
    }

    pub async fn size_bytes(&self) -> usize {
        self.state.read().await.bytes
    }

    /// Number of keys, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub async fn clear(&self) -> InvalidationEvent {
        let mut state = self.state.write().await;

        let count = state.entries.len();
        state.entries.clear();
        state.recency.clear();
        state.bytes = 0;
        state.stats.deleted += count as u64;
        state.sync_gauges();

        info!("Cleared {} keys from store", count);
        InvalidationEvent::new(InvalidationReason::Cleared, count)
    }

    /// Sweep expired keys; `None` when nothing had expired
    pub async fn cleanup_expired(&self) -> Option<InvalidationEvent> {
        let mut state = self.state.write().await;

        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        if expired.is_empty() {
            return None;
        }

        for key in &expired {
            state.remove(key);
        }
        state.stats.expired += expired.len() as u64;
        state.sync_gauges();

        Some(InvalidationEvent::new(InvalidationReason::Expired, expired.len()))
    }

    fn insert(&self, state: &mut StoreState, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        if let Some(existing) = state.entries.get_mut(key) {
            let old_size = existing.size;
            existing.replace(key, value, ttl);
            let new_size = existing.size;
            state.bytes = state.bytes.saturating_sub(old_size) + new_size;
            state.touch(key);
        } else {
            let entry = StoreEntry::new(key, value, ttl);
            self.make_room(state, entry.size)?;

            state.bytes += entry.size;
            state.entries.insert(key.to_string(), entry);
            state.recency.push_back(key.to_string());
        }

        state.sync_gauges();
        Ok(())
    }

    /// Evict least recently used keys until `incoming` more bytes fit
    fn make_room(&self, state: &mut StoreState, incoming: usize) -> Result<()> {
        if incoming > self.config.max_bytes {
            return Err(CacheError::CapacityExceeded(format!(
                "entry of {} bytes exceeds the {} byte limit",
                incoming, self.config.max_bytes
            )));
        }

        while state.entries.len() >= self.config.max_entries
            || state.bytes + incoming > self.config.max_bytes
        {
            let Some(victim) = state.eviction_candidate() else {
                warn!("Store over its limits with only held locks left");
                return Err(CacheError::CapacityExceeded("store limits exceeded".into()));
            };
            debug!("Evicting least recently used key: {}", victim);
            state.remove(&victim);
            state.stats.evicted += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        let mut state = self.state.write().await;

        if state.purge_if_expired(key) {
            state.stats.misses += 1;
            state.sync_gauges();
            return Ok(None);
        }

        let value = state.entries.get_mut(key).map(|entry| {
            entry.record_read();
            entry.value.clone()
        });
        match value {
            Some(value) => {
                state.stats.hits += 1;
                if self.config.refresh_on_read {
                    state.touch(key);
                }
                Ok(Some(value))
            }
            None => {
                state.stats.misses += 1;
                Ok(None)
            }
        }
    }

    async fn set_ex(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        let ttl = self.config.jittered(ttl);
        let mut state = self.state.write().await;
        self.insert(&mut state, key, value, ttl)
    }

    async fn set_nx_ex(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<bool> {
        let mut state = self.state.write().await;

        state.purge_if_expired(key);
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        self.insert(&mut state, key, value, ttl)?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut state = self.state.write().await;

        let live = state.remove(key).is_some_and(|entry| !entry.is_expired());
        if live {
            state.stats.deleted += 1;
        }
        state.sync_gauges();
        Ok(live)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.entries.get(key).is_some_and(|entry| !entry.is_expired()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut state = self.state.write().await;

        let keys: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            state.remove(key);
        }
        state.stats.deleted += keys.len() as u64;
        state.sync_gauges();

        debug!("Removed {} keys under {}", keys.len(), prefix);
        Ok(keys.len())
    }
}

/// Sweep expired keys every `cleanup_interval`, forever
pub async fn start_auto_cleanup(store: Arc<MemoryStore>) {
    let mut ticker = tokio::time::interval(store.config.cleanup_interval);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Some(event) = store.cleanup_expired().await {
            debug!("Store sweep: {}", event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(config: CacheConfig) -> MemoryStore {
        MemoryStore::new(config)
    }

    #[tokio::test]
    async fn test_basic_set_and_get() {
        let store = store_with(CacheConfig::default());

        store
            .set_ex("key1", "value1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get("key1").await.unwrap();
        assert_eq!(value, Some("value1".to_string()));

        let stats = store.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.keys, 1);
    }

    #[tokio::test]
    async fn test_miss() {
        let store = store_with(CacheConfig::default());

        assert_eq!(store.get("nonexistent").await.unwrap(), None);
        assert_eq!(store.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = store_with(CacheConfig::default());

        store
            .set_ex("key1", "value1".to_string(), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(store.get("key1").await.unwrap().is_some());
        assert!(store.exists("key1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!store.exists("key1").await.unwrap());
        assert!(store.get("key1").await.unwrap().is_none());
        assert_eq!(store.stats().await.expired, 1);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_value() {
        let store = store_with(CacheConfig::default());
        let ttl = Duration::from_secs(60);

        store.set_ex("k", "first".to_string(), ttl).await.unwrap();
        store.set_ex("k", "second answer".to_string(), ttl).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("second answer".to_string()));
        assert_eq!(store.len().await, 1);

        let expected = crate::cache::entry::charged_size("k", "second answer");
        assert_eq!(store.size_bytes().await, expected);
    }

    #[tokio::test]
    async fn test_set_nx_only_when_absent() {
        let store = store_with(CacheConfig::default());
        let ttl = Duration::from_secs(60);

        assert!(store.set_nx_ex("lock", "processing".into(), ttl).await.unwrap());
        assert!(!store.set_nx_ex("lock", "processing".into(), ttl).await.unwrap());

        assert!(store.delete("lock").await.unwrap());
        assert!(store.set_nx_ex("lock", "processing".into(), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_replaces_expired_value() {
        let store = store_with(CacheConfig::default());

        assert!(store
            .set_nx_ex("lock", "processing".into(), Duration::from_millis(30))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store
            .set_nx_ex("lock", "processing".into(), Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_is_atomic_under_contention() {
        let store = Arc::new(store_with(CacheConfig::default()));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .set_nx_ex("lock:doc:q", "processing".into(), Duration::from_secs(5))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let config = CacheConfig::builder()
            .max_entries(3)
            .refresh_on_read(true)
            .build();
        let store = store_with(config);
        let ttl = Duration::from_secs(60);

        store.set_ex("key1", "value1".into(), ttl).await.unwrap();
        store.set_ex("key2", "value2".into(), ttl).await.unwrap();
        store.set_ex("key3", "value3".into(), ttl).await.unwrap();

        // Reading key1 makes key2 the least recently used
        store.get("key1").await.unwrap();
        store.set_ex("key4", "value4".into(), ttl).await.unwrap();

        assert!(store.get("key2").await.unwrap().is_none());
        assert!(store.get("key1").await.unwrap().is_some());
        assert!(store.get("key3").await.unwrap().is_some());
        assert!(store.get("key4").await.unwrap().is_some());
        assert_eq!(store.stats().await.evicted, 1);
    }

    #[tokio::test]
    async fn test_held_lock_survives_eviction() {
        let store = store_with(CacheConfig::builder().max_entries(2).build());
        let ttl = Duration::from_secs(60);

        assert!(store.set_nx_ex("lock:d:h", "processing".into(), ttl).await.unwrap());
        store.set_ex("exact_cache:d:1", "first".into(), ttl).await.unwrap();
        store.set_ex("exact_cache:d:2", "second".into(), ttl).await.unwrap();

        assert!(store.exists("lock:d:h").await.unwrap());
        assert!(!store.set_nx_ex("lock:d:h", "processing".into(), ttl).await.unwrap());
        assert!(store.get("exact_cache:d:1").await.unwrap().is_none());
        assert!(store.get("exact_cache:d:2").await.unwrap().is_some());
        assert_eq!(store.stats().await.evicted, 1);
    }

    #[tokio::test]
    async fn test_store_full_of_locks_rejects_writes() {
        let store = store_with(CacheConfig::builder().max_entries(2).build());
        let ttl = Duration::from_secs(60);

        assert!(store.set_nx_ex("lock:d:1", "processing".into(), ttl).await.unwrap());
        assert!(store.set_nx_ex("lock:d:2", "processing".into(), ttl).await.unwrap());

        let result = store.set_ex("exact_cache:d:1", "answer".into(), ttl).await;
        assert!(matches!(result, Err(CacheError::CapacityExceeded(_))));
        let result = store.set_nx_ex("lock:d:3", "processing".into(), ttl).await;
        assert!(matches!(result, Err(CacheError::CapacityExceeded(_))));

        assert!(store.exists("lock:d:1").await.unwrap());
        assert!(store.exists("lock:d:2").await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_entry_rejected() {
        let config = CacheConfig::builder().max_bytes(64).build();
        let store = store_with(config);

        let result = store
            .set_ex("big", "x".repeat(1024), Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(CacheError::CapacityExceeded(_))));
    }

    #[tokio::test]
    async fn test_delete_prefix() {
        let store = store_with(CacheConfig::default());
        let ttl = Duration::from_secs(60);

        store.set_ex("exact_cache:a:1", "x".into(), ttl).await.unwrap();
        store.set_ex("exact_cache:a:2", "y".into(), ttl).await.unwrap();
        store.set_ex("exact_cache:b:1", "z".into(), ttl).await.unwrap();

        assert_eq!(store.delete_prefix("exact_cache:a:").await.unwrap(), 2);
        assert!(store.get("exact_cache:b:1").await.unwrap().is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = store_with(CacheConfig::default());

        store.set_ex("key1", "value1".into(), Duration::from_millis(50)).await.unwrap();
        store.set_ex("key2", "value2".into(), Duration::from_millis(50)).await.unwrap();
        store.set_ex("key3", "value3".into(), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let event = store.cleanup_expired().await.unwrap();
        assert_eq!(event.removed, 2);
        assert_eq!(event.reason, InvalidationReason::Expired);
        assert_eq!(store.len().await, 1);
        assert!(store.cleanup_expired().await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store_with(CacheConfig::default());

        store.set_ex("key1", "value1".into(), Duration::from_secs(60)).await.unwrap();
        store.set_ex("key2", "value2".into(), Duration::from_secs(60)).await.unwrap();

        let event = store.clear().await;
        assert_eq!(event.removed, 2);
        assert!(store.is_empty().await);
        assert_eq!(store.size_bytes().await, 0);
    }
}
