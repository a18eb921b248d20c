//! Key/value store abstraction
//!
//! The exact-match cache and the generation lock share one substrate: a store
//! with per-key expiry and an atomic "set if absent with expiry". This is the
//! subset of Redis (`GET`, `SET .. EX`, `SET .. EX NX`, `DEL`, `EXISTS`) the
//! query path relies on, so any store offering those semantics can back it.

use crate::cache::types::CacheValue;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Store with expiry and atomic set-if-absent
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a live value; expired keys read as absent
    async fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Write a value that expires after `ttl`, replacing any previous value
    async fn set_ex(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()>;

    /// Write a value only if no live value exists; returns whether it was written
    ///
    /// Check and write must be atomic with respect to concurrent callers.
    async fn set_nx_ex(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<bool>;

    /// Remove a key; returns whether a live value was removed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Whether a live value exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`; returns how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}
