//! Fixed-capacity LRU cache for embeddings with a uniform TTL
//!
//! Backed by an `IndexMap` whose insertion order doubles as the recency
//! order: front = least recently used, back = most recently used. Every
//! operation takes the write lock once, so a call never interleaves
//! reader and writer sections.

use crate::cache::{CacheStats, EmbeddingCache, cache_key};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::RwLock;

struct LruEntry {
    embedding: Vec<f32>,
    created_at: Instant,
    ttl: Duration,
}

impl LruEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

struct LruInner {
    entries: IndexMap<String, LruEntry>,
    stats: CacheStats,
}

/// Thread-safe LRU embedding cache with a uniform TTL
pub struct LruEmbeddingCache {
    max_size: usize,
    ttl: Duration,
    inner: RwLock<LruInner>,
}

impl LruEmbeddingCache {
    /// Create a cache holding at most `max_size` entries, each valid for `ttl`
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            inner: RwLock::new(LruInner {
                entries: IndexMap::with_capacity(max_size.max(1)),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Get the capacity of the cache
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Look up the embedding for a text, refreshing its recency
    ///
    /// Expired entries are removed on contact and counted as misses.
    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(text);
        let mut inner = self.inner.write().await;

        let Some(entry) = inner.entries.shift_remove(&key) else {
            inner.stats.misses += 1;
            return None;
        };
        if entry.is_expired() {
            inner.stats.misses += 1;
            return None;
        }

        let embedding = entry.embedding.clone();
        // Re-insert at the back: most recently used
        inner.entries.insert(key, entry);
        inner.stats.hits += 1;
        Some(embedding)
    }

    /// Store the embedding for a text
    ///
    /// An existing entry is replaced and promoted; above capacity the
    /// least recently used entry is evicted.
    pub async fn put(&self, text: &str, embedding: Vec<f32>) {
        let key = cache_key(text);
        let mut inner = self.inner.write().await;

        inner.entries.shift_remove(&key);
        if inner.entries.len() >= self.max_size
            && inner.entries.shift_remove_index(0).is_some()
        {
            inner.stats.evictions += 1;
        }

        inner.entries.insert(
            key,
            LruEntry {
                embedding,
                created_at: Instant::now(),
                ttl: self.ttl,
            },
        );
        inner.stats.total_cached += 1;
    }

    /// Sweep out expired entries, returning how many were removed
    pub async fn remove_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - inner.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "swept expired embedding cache entries");
        }
        removed
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.stats.last_cleared = Some(SystemTime::now());
    }

    /// Get the current number of entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats.clone()
    }
}

#[async_trait]
impl EmbeddingCache for LruEmbeddingCache {
    async fn get(&self, text: &str) -> Option<Vec<f32>> {
        LruEmbeddingCache::get(self, text).await
    }

    async fn put(&self, text: &str, embedding: Vec<f32>) {
        LruEmbeddingCache::put(self, text, embedding).await;
    }

    async fn clear(&self) {
        LruEmbeddingCache::clear(self).await;
    }

    async fn len(&self) -> usize {
        LruEmbeddingCache::len(self).await
    }

    async fn stats(&self) -> CacheStats {
        LruEmbeddingCache::stats(self).await
    }

    fn flavor(&self) -> &'static str {
        "lru"
    }
}
