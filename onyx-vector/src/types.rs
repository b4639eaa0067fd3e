//! Shared types for vector entries and search results

use crate::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form metadata attached to a stored vector
pub type Metadata = HashMap<String, serde_json::Value>;

/// A stored vector with its identifier and optional metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Stable identifier, unique within a store
    pub id: String,
    /// The vector data
    pub vector: Vec<f32>,
    /// Optional metadata associated with the vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl VectorEntry {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: None,
        }
    }

    pub fn with_metadata(id: impl Into<String>, vector: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: Some(metadata),
        }
    }

    /// Get the dimension of this entry's vector
    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

/// A raw nearest-neighbor hit from the HNSW graph
///
/// Carries the graph-level distance; the store converts distances into
/// similarity scores when it assembles a [`SearchResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Identifier of the matched node
    pub id: String,
    /// The matched node's vector
    pub vector: Vec<f32>,
    /// Distance to the query (lower is more similar)
    pub distance: f32,
}

/// Result of a vector similarity search through the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The ID of the found vector
    pub id: String,
    /// The matched vector
    pub vector: Vec<f32>,
    /// Optional metadata associated with the vector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Similarity score (higher is more similar, for every metric)
    pub score: f32,
    /// The metric the score was computed under
    pub metric: DistanceMetric,
}

impl PartialEq for SearchResult {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && (self.score - other.score).abs() < f32::EPSILON
    }
}

impl Eq for SearchResult {}

impl PartialOrd for SearchResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Highest score first; ties break on id so sort order is stable
        // across runs and across the linear/HNSW modes.
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.id.cmp(&other.id))
    }
}
