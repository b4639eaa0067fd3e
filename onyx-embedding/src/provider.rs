//! The embedding provider contract

use crate::Result;
use async_trait::async_trait;

/// A source of text embeddings
///
/// Implementations typically wrap a local model or a remote API. Callers
/// cancel in-flight work by dropping the returned future.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Dimension of the vectors this provider produces
    fn dimensions(&self) -> usize;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts
    ///
    /// Must return exactly one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Whether the provider can currently serve requests
    async fn is_available(&self) -> bool;

    /// Approximate cost per embedding call, in arbitrary units
    fn cost(&self) -> f64;
}
