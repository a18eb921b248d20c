//! Shared cache types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified store key, e.g. `exact_cache:{document}:{hash}`
pub type CacheKey = String;

/// Stored value: an answer text or the lock marker
pub type CacheValue = String;

/// Counters kept by [`MemoryStore`](super::MemoryStore)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,

    /// Live keys, including expired ones not yet swept
    pub keys: usize,

    /// Approximate bytes held
    pub bytes: usize,

    /// Keys dropped after their TTL ran out
    pub expired: u64,

    /// Keys dropped to stay within the entry or byte limits
    pub evicted: u64,

    /// Keys removed by delete, prefix delete or clear
    pub deleted: u64,
}

impl CacheStats {
    /// Fraction of reads that found a live value
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            return 0.0;
        }
        self.hits as f64 / reads as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} keys ({} bytes), {} hits / {} misses ({:.1}%), {} expired, {} evicted",
            self.keys,
            self.bytes,
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.expired,
            self.evicted
        )
    }
}

/// Which answer cache served a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheLayer {
    /// Hash of the normalized question
    ExactMatch,

    /// Embedding proximity to a previously answered question
    Semantic,
}

impl fmt::Display for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheLayer::ExactMatch => write!(f, "exact_match"),
            CacheLayer::Semantic => write!(f, "semantic"),
        }
    }
}
