//! Embedding Provider and Caching Layers for OnyxDB
//!
//! An embedding provider maps text to a fixed-dimension vector, usually by
//! calling out to a model. Those calls are expensive, so this module wraps
//! any provider with a cache that deduplicates repeated work:
//!
//! - **LRU cache**: fixed capacity, uniform TTL, recency-ordered
//! - **Adaptive cache**: per-entry TTL that stretches for frequently
//!   accessed texts and shrinks for rarely accessed ones
//! - **Cached provider**: composes a provider with either cache and keeps
//!   hit/miss/eviction counters
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use onyx_embedding::{CachedProvider, EmbeddingProvider, LruEmbeddingCache};
//!
//! # async fn example(model: Arc<dyn EmbeddingProvider>) -> Result<(), Box<dyn std::error::Error>> {
//! let cache = Arc::new(LruEmbeddingCache::new(10_000, Duration::from_secs(3600)));
//! let provider = CachedProvider::new(model, cache);
//!
//! let embedding = provider.embed("what is a small world graph?").await?;
//! # Ok(())
//! # }
//! ```

mod adaptive;
mod cache;
mod cached;
mod lru;
mod provider;

pub use adaptive::{AdaptiveCacheStats, AdaptiveEmbeddingCache, AdaptiveTtlConfig};
pub use cache::{CacheStats, EmbeddingCache, cache_key};
pub use cached::CachedProvider;
pub use lru::LruEmbeddingCache;
pub use provider::EmbeddingProvider;

/// Errors that can occur during embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    BatchSizeMismatch { expected: usize, actual: usize },

    #[error("Input text must not be empty")]
    EmptyInput,
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
