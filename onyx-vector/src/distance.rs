//! Distance kernels for vector similarity

use serde::{Deserialize, Serialize};

/// Distance metrics for measuring vector similarity
///
/// Serialized as integers so persisted indexes stay forward-compatible
/// with metrics added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity)
    /// Range: [0, 2], where 0 means identical direction
    /// Best for: Text embeddings, normalized vectors
    Cosine,

    /// Euclidean distance (L2 norm)
    /// Range: [0, ∞], where 0 means identical vectors
    /// Best for: Image embeddings, when magnitude matters
    Euclidean,

    /// Negated dot product (inner product)
    /// Range: (-∞, ∞), lower means more similar
    /// Best for: Normalized vectors, when you want magnitude-weighted similarity
    DotProduct,

    /// Manhattan distance (L1 norm)
    /// Range: [0, ∞], where 0 means identical vectors
    Manhattan,
}

impl From<DistanceMetric> for u8 {
    fn from(metric: DistanceMetric) -> Self {
        match metric {
            DistanceMetric::Cosine => 0,
            DistanceMetric::Euclidean => 1,
            DistanceMetric::DotProduct => 2,
            DistanceMetric::Manhattan => 3,
        }
    }
}

impl TryFrom<u8> for DistanceMetric {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DistanceMetric::Cosine),
            1 => Ok(DistanceMetric::Euclidean),
            2 => Ok(DistanceMetric::DotProduct),
            3 => Ok(DistanceMetric::Manhattan),
            other => Err(format!("unknown distance metric tag: {other}")),
        }
    }
}

impl DistanceMetric {
    /// Calculate the distance between two vectors
    ///
    /// Lower values always mean more similar, for every metric. Vectors of
    /// mismatched length yield `f32::MAX` rather than an error.
    pub fn distance(&self, v1: &[f32], v2: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_distance(v1, v2),
            DistanceMetric::Euclidean => euclidean_distance(v1, v2),
            DistanceMetric::DotProduct => dot_distance(v1, v2),
            DistanceMetric::Manhattan => manhattan_distance(v1, v2),
        }
    }

    /// Convert a distance into a "higher is better" similarity score
    ///
    /// Cosine maps back to the raw cosine similarity, dot product back to
    /// the raw inner product. Euclidean and Manhattan use `1 / (1 + d)` so
    /// scores from every metric sort the same way.
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::DotProduct => -distance,
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => 1.0 / (1.0 + distance),
        }
    }
}

/// Calculate cosine distance between two vectors
///
/// Returns `1 - cos(v1, v2)`, a value in [0, 2] where:
/// - 0.0 means vectors point in the same direction
/// - 1.0 means vectors are orthogonal (or either vector has zero norm)
/// - 2.0 means vectors point in opposite directions
#[inline]
pub fn cosine_distance(v1: &[f32], v2: &[f32]) -> f32 {
    if v1.len() != v2.len() {
        return f32::MAX;
    }

    let dot = dot_product(v1, v2);
    let mag1 = magnitude(v1);
    let mag2 = magnitude(v2);

    if mag1 == 0.0 || mag2 == 0.0 {
        return 1.0;
    }

    1.0 - dot / (mag1 * mag2)
}

/// Calculate Euclidean distance between two vectors
///
/// Returns the L2 norm of the difference between vectors.
/// Lower values indicate more similar vectors.
#[inline]
pub fn euclidean_distance(v1: &[f32], v2: &[f32]) -> f32 {
    if v1.len() != v2.len() {
        return f32::MAX;
    }

    v1.iter()
        .zip(v2.iter())
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum::<f32>()
        .sqrt()
}

/// Calculate the negated dot product of two vectors
///
/// Negated so that lower values indicate more similar vectors, matching
/// the orientation of the other kernels.
#[inline]
pub fn dot_distance(v1: &[f32], v2: &[f32]) -> f32 {
    if v1.len() != v2.len() {
        return f32::MAX;
    }

    -dot_product(v1, v2)
}

/// Calculate Manhattan (L1) distance between two vectors
#[inline]
pub fn manhattan_distance(v1: &[f32], v2: &[f32]) -> f32 {
    if v1.len() != v2.len() {
        return f32::MAX;
    }

    v1.iter().zip(v2.iter()).map(|(a, b)| (a - b).abs()).sum()
}

/// Calculate dot product (inner product) of two vectors
///
/// Returns the sum of element-wise products.
#[inline]
pub fn dot_product(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum()
}

/// Calculate the magnitude (L2 norm) of a vector
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize a vector to unit length
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}
