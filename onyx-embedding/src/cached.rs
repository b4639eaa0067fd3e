//! Caching wrapper around any embedding provider
//!
//! Composes a provider with either cache flavor. Lookups go to the cache
//! first; misses fan out to the provider and are stored on the way back.
//! Batch requests make a single provider call covering only the uncached
//! texts, then splice the fresh embeddings back into input order.

use crate::cache::EmbeddingCache;
use crate::provider::EmbeddingProvider;
use crate::{EmbeddingError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// An [`EmbeddingProvider`] that deduplicates work through a cache
pub struct CachedProvider {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn EmbeddingCache>,
    name: String,
}

impl CachedProvider {
    /// Wrap a provider with a cache
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<dyn EmbeddingCache>) -> Self {
        let name = format!("{}-cached-{}", provider.name(), cache.flavor());
        Self {
            provider,
            cache,
            name,
        }
    }

    /// The cache backing this provider
    pub fn cache(&self) -> &Arc<dyn EmbeddingCache> {
        &self.cache
    }
}

#[async_trait]
impl EmbeddingProvider for CachedProvider {
    /// The wrapped provider's name with a suffix naming the cache flavor
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        if let Some(embedding) = self.cache.get(text).await {
            return Ok(embedding);
        }

        let embedding = self.provider.embed(text).await?;
        self.cache.put(text, embedding.clone()).await;
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        // Partition into cached and uncached by per-text lookup
        let mut results: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        let mut missing: Vec<usize> = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            match self.cache.get(text).await {
                Some(embedding) => results[i] = embedding,
                None => missing.push(i),
            }
        }

        // One provider call covers every miss
        if !missing.is_empty() {
            let uncached: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.provider.embed_batch(&uncached).await?;
            if fresh.len() != uncached.len() {
                return Err(EmbeddingError::BatchSizeMismatch {
                    expected: uncached.len(),
                    actual: fresh.len(),
                });
            }
            for (&i, embedding) in missing.iter().zip(fresh) {
                self.cache.put(&texts[i], embedding.clone()).await;
                results[i] = embedding;
            }
        }

        Ok(results)
    }

    async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    fn cost(&self) -> f64 {
        self.provider.cost()
    }
}
