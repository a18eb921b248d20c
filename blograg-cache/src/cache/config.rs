//! Configuration for the cache and lock layers
//!
//! Defaults follow the production deployment of the blog assistant:
//! - Exact answers live for 2 hours
//! - Generation locks expire after 60 seconds, longer than any synthesis
//! - Waiters poll every 500ms for up to 40 polls (20 seconds)
//! - Semantic hits require cosine distance below 0.2

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exact-match answer store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long an exact answer stays servable
    pub answer_ttl: Duration,

    /// Key limit of the in-process store; least recently used keys go first
    pub max_entries: usize,

    /// Byte limit of the in-process store
    pub max_bytes: usize,

    /// Random spread applied to answer TTLs, as a fraction (0.0 - 1.0)
    pub ttl_jitter: f64,

    /// Sweep expired keys in the background
    pub enable_auto_cleanup: bool,
    pub cleanup_interval: Duration,

    /// Reads move a key to the back of the eviction queue
    pub refresh_on_read: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            answer_ttl: Duration::from_secs(2 * 3600),
            max_entries: 10_000,
            max_bytes: 64 * 1024 * 1024,
            ttl_jitter: 0.0,
            enable_auto_cleanup: true,
            cleanup_interval: Duration::from_secs(300),
            refresh_on_read: true,
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Test preset: fixed TTL, no background sweep
    pub fn ephemeral(ttl: Duration) -> Self {
        Self {
            answer_ttl: ttl,
            enable_auto_cleanup: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.answer_ttl.is_zero() {
            return Err(CacheError::ConfigError("answer_ttl must be greater than 0".into()));
        }
        if self.max_entries == 0 || self.max_bytes == 0 {
            return Err(CacheError::ConfigError(
                "max_entries and max_bytes must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            return Err(CacheError::ConfigError(
                "ttl_jitter must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Spread `ttl` by up to `ttl_jitter` in either direction
    pub fn jittered(&self, ttl: Duration) -> Duration {
        if self.ttl_jitter == 0.0 {
            return ttl;
        }

        let base = ttl.as_secs_f64();
        let offset = (rand::random::<f64>() * 2.0 - 1.0) * base * self.ttl_jitter;
        Duration::from_secs_f64((base + offset).max(0.001))
    }
}

#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: Option<CacheConfig>,
}

impl CacheConfigBuilder {
    fn with(mut self, apply: impl FnOnce(&mut CacheConfig)) -> Self {
        apply(self.config.get_or_insert_with(CacheConfig::default));
        self
    }

    pub fn answer_ttl(self, ttl: Duration) -> Self {
        self.with(|c| c.answer_ttl = ttl)
    }

    pub fn max_entries(self, max: usize) -> Self {
        self.with(|c| c.max_entries = max)
    }

    pub fn max_bytes(self, max: usize) -> Self {
        self.with(|c| c.max_bytes = max)
    }

    pub fn ttl_jitter(self, jitter: f64) -> Self {
        self.with(|c| c.ttl_jitter = jitter)
    }

    pub fn enable_auto_cleanup(self, enable: bool) -> Self {
        self.with(|c| c.enable_auto_cleanup = enable)
    }

    pub fn cleanup_interval(self, interval: Duration) -> Self {
        self.with(|c| c.cleanup_interval = interval)
    }

    pub fn refresh_on_read(self, enable: bool) -> Self {
        self.with(|c| c.refresh_on_read = enable)
    }

    pub fn build(self) -> CacheConfig {
        self.config.unwrap_or_default()
    }
}

/// Timing of the per-question generation lock and its waiting protocol
///
/// The lock TTL must exceed the worst-case synthesis latency so that a live
/// owner is never overtaken, while an abandoned lock still heals on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Whether the coordinator is used at all
    pub enabled: bool,

    /// Expiry of a held lock
    pub lock_ttl: Duration,

    /// Delay between exact-cache polls while another request owns the lock
    pub poll_interval: Duration,

    /// Maximum polls per wait cycle
    pub max_polls: u32,

    /// Wait/acquire cycles before proceeding without the lock
    pub acquire_attempts: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_ttl: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            max_polls: 40,
            acquire_attempts: 2,
        }
    }
}

impl LockConfig {
    /// Longest time a single wait cycle can block
    pub fn max_wait(&self) -> Duration {
        self.poll_interval * self.max_polls
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl.is_zero() {
            return Err(CacheError::ConfigError(
                "lock_ttl must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(CacheError::ConfigError(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.acquire_attempts == 0 {
            return Err(CacheError::ConfigError(
                "acquire_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the per-document semantic answer cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether semantic lookups are performed
    pub enabled: bool,

    /// Maximum cosine distance (1 - similarity) for a hit
    pub distance_threshold: f32,

    /// Maximum stored question/answer pairs per document
    /// The least recently used pair is evicted when full
    pub max_entries_per_document: usize,

    /// Optional maximum age of a stored pair
    pub max_age: Option<Duration>,
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            distance_threshold: 0.2,
            max_entries_per_document: 256,
            max_age: None,
        }
    }
}

impl SemanticCacheConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.distance_threshold) {
            return Err(CacheError::ConfigError(
                "distance_threshold must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_entries_per_document == 0 {
            return Err(CacheError::ConfigError(
                "max_entries_per_document must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
