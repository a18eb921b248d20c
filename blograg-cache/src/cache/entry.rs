//! Stored values with expiry

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::cache::types::CacheValue;

/// Bookkeeping bytes charged to every entry on top of key and value
const ENTRY_OVERHEAD: usize = 64;

/// Cap on expiry distance; larger TTLs never expire in practice
const FOREVER_DAYS: i64 = 365 * 100;

/// One value in the [`MemoryStore`](super::MemoryStore)
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub value: CacheValue,
    pub expires_at: DateTime<Utc>,
    pub last_read: Option<DateTime<Utc>>,
    pub reads: u64,
    /// Bytes charged against the store limit
    pub size: usize,
}

impl StoreEntry {
    pub fn new(key: &str, value: CacheValue, ttl: Duration) -> Self {
        let size = charged_size(key, &value);
        Self {
            value,
            expires_at: deadline(ttl),
            last_read: None,
            reads: 0,
            size,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining(&self) -> Option<Duration> {
        (self.expires_at - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
    }

    pub fn record_read(&mut self) {
        self.last_read = Some(Utc::now());
        self.reads += 1;
    }

    /// Overwrite in place; the TTL restarts like a fresh `SET EX`
    pub fn replace(&mut self, key: &str, value: CacheValue, ttl: Duration) {
        self.size = charged_size(key, &value);
        self.value = value;
        self.expires_at = deadline(ttl);
    }
}

pub(crate) fn charged_size(key: &str, value: &str) -> usize {
    key.len() + value.len() + ENTRY_OVERHEAD
}

fn deadline(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl)
        .unwrap_or_else(|_| chrono::Duration::days(FOREVER_DAYS))
        .min(chrono::Duration::days(FOREVER_DAYS));
    Utc::now() + ttl
}
