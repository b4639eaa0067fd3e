//! Shared cache machinery: keys, counters, and the cache contract

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::time::SystemTime;

/// Derive the cache key for a text: the SHA-256 hex digest
///
/// Hashing keeps keys bounded regardless of input length and avoids
/// holding large prompts in the cache's key set.
pub fn cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of capacity evictions
    pub evictions: u64,
    /// Total entries ever stored
    pub total_cached: u64,
    /// When the cache was last cleared, if ever
    pub last_cleared: Option<SystemTime>,
}

impl CacheStats {
    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// The contract shared by both embedding caches
///
/// `get` counts a hit or a miss and refreshes recency; `put` stores an
/// embedding, evicting the least recently used entry above capacity.
#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    /// Look up the embedding for a text
    async fn get(&self, text: &str) -> Option<Vec<f32>>;

    /// Store the embedding for a text
    async fn put(&self, text: &str, embedding: Vec<f32>);

    /// Remove every entry
    async fn clear(&self);

    /// Number of live entries
    async fn len(&self) -> usize;

    /// Base counters, identical across cache flavors
    async fn stats(&self) -> CacheStats;

    /// Short tag naming the cache flavor ("lru" or "adaptive")
    fn flavor(&self) -> &'static str;
}
