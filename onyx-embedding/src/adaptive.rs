//! Adaptive-TTL cache for embeddings
//!
//! Same shape as the LRU cache, but every hit re-targets the entry's
//! expiry from its observed access frequency: frequently requested texts
//! stay cached up to `max_ttl`, rarely requested ones decay toward
//! `min_ttl`. Frequency is measured in accesses per hour over the entry's
//! lifetime, with the measurement window floored at one hour so brand-new
//! entries are not all counted as hot.

use crate::cache::{CacheStats, EmbeddingCache, cache_key};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// Accesses per hour above which an entry pins to `max_ttl`
const VERY_HOT_PER_HOUR: f64 = 10.0;
/// Accesses per hour above which an entry's TTL grows past `base_ttl`
const HOT_PER_HOUR: f64 = 1.0;
/// Accesses per hour below which an entry pins to `min_ttl`
const VERY_COLD_PER_HOUR: f64 = 0.1;
/// Smoothing factor for the running average of granted TTLs
const AVG_TTL_ALPHA: f64 = 0.1;

/// TTL bounds for the adaptive cache
#[derive(Debug, Clone)]
pub struct AdaptiveTtlConfig {
    /// Maximum number of entries
    pub max_size: usize,
    /// TTL granted to new entries
    pub base_ttl: Duration,
    /// Floor for re-targeted TTLs
    pub min_ttl: Duration,
    /// Ceiling for re-targeted TTLs
    pub max_ttl: Duration,
}

impl Default for AdaptiveTtlConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            base_ttl: Duration::from_secs(3600),
            min_ttl: Duration::from_secs(600),
            max_ttl: Duration::from_secs(86400),
        }
    }
}

/// Frequency band an entry fell into when its TTL was re-targeted
enum Band {
    VeryHot,
    Hot,
    Cold,
    VeryCold,
}

struct AdaptiveEntry {
    embedding: Vec<f32>,
    created_at: SystemTime,
    expires_at: SystemTime,
    access_count: u64,
    last_accessed: SystemTime,
    /// Accesses per hour over the entry's lifetime (window floored at 1h)
    access_frequency: f64,
}

struct AdaptiveInner {
    entries: IndexMap<String, AdaptiveEntry>,
    stats: AdaptiveCacheStats,
}

/// Statistics for the adaptive cache
///
/// Extends the base counters with the TTL-adaptation measurements.
/// `hot_entries` and `cold_entries` count re-targets into the extreme
/// bands; `avg_ttl_secs` is an exponential moving average of granted TTLs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdaptiveCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_cached: u64,
    pub last_cleared: Option<SystemTime>,
    pub hot_entries: u64,
    pub cold_entries: u64,
    pub avg_ttl_secs: f64,
    pub ttl_adjustments: u64,
}

impl AdaptiveCacheStats {
    fn base(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            total_cached: self.total_cached,
            last_cleared: self.last_cleared,
        }
    }
}

/// Thread-safe embedding cache whose per-entry TTL follows access frequency
pub struct AdaptiveEmbeddingCache {
    config: AdaptiveTtlConfig,
    inner: RwLock<AdaptiveInner>,
}

impl AdaptiveEmbeddingCache {
    /// Create a cache with the given TTL bounds
    pub fn new(config: AdaptiveTtlConfig) -> Self {
        let capacity = config.max_size.max(1);
        Self {
            config: AdaptiveTtlConfig {
                max_size: capacity,
                ..config
            },
            inner: RwLock::new(AdaptiveInner {
                entries: IndexMap::with_capacity(capacity),
                stats: AdaptiveCacheStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &AdaptiveTtlConfig {
        &self.config
    }

    /// Look up the embedding for a text
    ///
    /// A hit refreshes the entry's recency and access statistics, then
    /// re-targets its TTL from the new frequency. Expired entries are
    /// removed on contact and counted as misses.
    pub async fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = cache_key(text);
        let now = SystemTime::now();
        let mut inner = self.inner.write().await;

        let Some(mut entry) = inner.entries.shift_remove(&key) else {
            inner.stats.misses += 1;
            return None;
        };
        if now > entry.expires_at {
            inner.stats.misses += 1;
            return None;
        }

        entry.access_count += 1;
        entry.last_accessed = now;
        entry.access_frequency = access_frequency(entry.access_count, entry.created_at, now);

        let (ttl, band) = self.target_ttl(entry.access_frequency);
        entry.expires_at = now + ttl;

        match band {
            Band::VeryHot => inner.stats.hot_entries += 1,
            Band::VeryCold => inner.stats.cold_entries += 1,
            Band::Hot | Band::Cold => {}
        }
        inner.stats.ttl_adjustments += 1;
        let granted = ttl.as_secs_f64();
        inner.stats.avg_ttl_secs = if inner.stats.ttl_adjustments == 1 {
            granted
        } else {
            AVG_TTL_ALPHA * granted + (1.0 - AVG_TTL_ALPHA) * inner.stats.avg_ttl_secs
        };

        let embedding = entry.embedding.clone();
        inner.entries.insert(key, entry);
        inner.stats.hits += 1;
        Some(embedding)
    }

    /// Store the embedding for a text
    ///
    /// New entries start at `base_ttl` with an access count of one. A
    /// re-put replaces the entry wholesale, restarting its history.
    pub async fn put(&self, text: &str, embedding: Vec<f32>) {
        let key = cache_key(text);
        let now = SystemTime::now();
        let mut inner = self.inner.write().await;

        inner.entries.shift_remove(&key);
        if inner.entries.len() >= self.config.max_size
            && inner.entries.shift_remove_index(0).is_some()
        {
            inner.stats.evictions += 1;
        }

        inner.entries.insert(
            key,
            AdaptiveEntry {
                embedding,
                created_at: now,
                expires_at: now + self.config.base_ttl,
                access_count: 1,
                last_accessed: now,
                access_frequency: access_frequency(1, now, now),
            },
        );
        inner.stats.total_cached += 1;
    }

    /// Sweep out expired entries, returning how many were removed
    pub async fn remove_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.expires_at >= now);
        let removed = before - inner.entries.len();
        if removed > 0 {
            tracing::debug!(removed, "swept expired adaptive cache entries");
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
    pub async fn stats(&self) -> AdaptiveCacheStats {
        self.inner.read().await.stats.clone()
    }

    /// Map an access frequency to a TTL and its band
    ///
    /// Very hot entries pin to `max_ttl`, hot entries stretch past
    /// `base_ttl` with frequency, cold entries shrink below it, and very
    /// cold entries pin to `min_ttl`. The result is always clamped to
    /// `[min_ttl, max_ttl]`.
    fn target_ttl(&self, frequency: f64) -> (Duration, Band) {
        let base = self.config.base_ttl.as_secs_f64();
        let (secs, band) = if frequency > VERY_HOT_PER_HOUR {
            (self.config.max_ttl.as_secs_f64(), Band::VeryHot)
        } else if frequency > HOT_PER_HOUR {
            (base * (1.0 + frequency / 10.0), Band::Hot)
        } else if frequency >= VERY_COLD_PER_HOUR {
            (base * (0.5 + frequency * 0.5), Band::Cold)
        } else {
            (self.config.min_ttl.as_secs_f64(), Band::VeryCold)
        };

        let clamped = secs.clamp(
            self.config.min_ttl.as_secs_f64(),
            self.config.max_ttl.as_secs_f64(),
        );
        (Duration::from_secs_f64(clamped), band)
    }
}

/// Accesses per hour since creation, with the window floored at one hour
fn access_frequency(access_count: u64, created_at: SystemTime, now: SystemTime) -> f64 {
    let age_hours = now
        .duration_since(created_at)
        .unwrap_or_default()
        .as_secs_f64()
        / 3600.0;
    access_count as f64 / age_hours.max(1.0)
}

#[async_trait]
impl EmbeddingCache for AdaptiveEmbeddingCache {
    async fn get(&self, text: &str) -> Option<Vec<f32>> {
        AdaptiveEmbeddingCache::get(self, text).await
    }

    async fn put(&self, text: &str, embedding: Vec<f32>) {
        AdaptiveEmbeddingCache::put(self, text, embedding).await;
    }

    async fn clear(&self) {
        AdaptiveEmbeddingCache::clear(self).await;
    }

    async fn len(&self) -> usize {
        AdaptiveEmbeddingCache::len(self).await
    }

    async fn stats(&self) -> CacheStats {
        self.inner.read().await.stats.base()
    }

    fn flavor(&self) -> &'static str {
        "adaptive"
    }
}
