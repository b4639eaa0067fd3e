//! Hybrid Vector Search Module for OnyxDB
//!
//! This module provides in-process vector similarity search with a hybrid
//! execution strategy: small collections are served by an exhaustive linear
//! scan, and once a collection grows past a configured threshold it is
//! migrated into an HNSW graph for approximate search.
//!
//! # Features
//!
//! - **Hybrid execution**: Linear scan below the switch threshold, HNSW above it
//! - **HNSW Indexing**: Hierarchical Navigable Small World graphs for fast approximate nearest neighbor search
//! - **Multiple Distance Metrics**: Cosine, Euclidean, Dot product, Manhattan
//! - **Persistence**: JSON snapshot of the graph with atomic replace
//!
//! # Example
//!
//! ```rust,no_run
//! use onyx_vector::{VectorStore, VectorStoreConfig, DistanceMetric};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a hybrid store with cosine distance
//! let store = VectorStore::new(VectorStoreConfig::new(384, DistanceMetric::Cosine));
//!
//! // Add vectors
//! store.add("doc-1", vec![0.1; 384], None).await?;
//!
//! // Search for similar vectors
//! let results = store.search(&[0.1; 384], 10).await?;
//! # Ok(())
//! # }
//! ```

mod distance;
mod hnsw;
mod persistence;
mod store;
mod types;

pub use distance::{
    DistanceMetric, cosine_distance, dot_distance, dot_product, euclidean_distance, magnitude,
    manhattan_distance, normalize,
};
pub use hnsw::{HnswConfig, HnswIndex, HnswNode, HnswStats};
pub use store::{VectorStore, VectorStoreConfig};
pub use types::{Metadata, Neighbor, SearchResult, VectorEntry};

/// Errors that can occur during vector operations
#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector not found: {0}")]
    NotFound(String),

    #[error("Vector already exists: {0}")]
    AlreadyExists(String),

    #[error("Index is empty")]
    IndexEmpty,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VectorError>;
