//! Hybrid vector store
//!
//! Owns a keyed collection of vectors and serves similarity queries with
//! an exhaustive linear scan while the collection is small. When the
//! collection reaches the configured switch threshold, every entry is
//! migrated into a freshly built HNSW index and all subsequent operations
//! are served by the graph. Migration is one-way: the store never falls
//! back to linear mode (except through `clear`).
//!
//! Scores are "higher is better" under every metric, and the conversion
//! from distance to score is identical in both modes, so result ordering
//! is stable across the migration boundary.

use crate::hnsw::{HnswConfig, HnswIndex, HnswStats};
use crate::types::{Metadata, SearchResult, VectorEntry};
use crate::{DistanceMetric, Result, VectorError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Collection size at which the store migrates to HNSW
const DEFAULT_SWITCH_THRESHOLD: usize = 100;

/// Configuration for the hybrid store, frozen at construction
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Dimension of every vector in the store
    pub dimension: usize,
    /// Distance metric to use
    pub metric: DistanceMetric,
    /// Collection size that triggers migration to HNSW
    pub switch_threshold: usize,
    /// Parameters for the HNSW index built at migration
    pub hnsw: HnswConfig,
}

impl VectorStoreConfig {
    /// Create a configuration with the default threshold and HNSW parameters
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            switch_threshold: DEFAULT_SWITCH_THRESHOLD,
            hnsw: HnswConfig::default(),
        }
    }

    /// Set the migration threshold
    pub fn with_switch_threshold(mut self, threshold: usize) -> Self {
        self.switch_threshold = threshold;
        self
    }

    /// Set HNSW configuration
    pub fn with_hnsw_config(mut self, config: HnswConfig) -> Self {
        self.hnsw = config;
        self
    }
}

/// Hybrid linear-scan / HNSW vector store
///
/// Safe to share across tasks. Lock order is mode first, then either the
/// linear table or the graph, never both at once.
pub struct VectorStore {
    config: VectorStoreConfig,
    /// Current mode: false = linear scan, true = HNSW
    use_hnsw: RwLock<bool>,
    /// Keyed collection serving linear mode; emptied by migration
    linear: RwLock<HashMap<String, Vec<f32>>>,
    /// The HNSW index, built lazily at migration
    graph: RwLock<Option<HnswIndex>>,
    /// Metadata lives beside the index and survives migration
    metadata: RwLock<HashMap<String, Metadata>>,
}

impl VectorStore {
    /// Create a new hybrid store
    pub fn new(config: VectorStoreConfig) -> Self {
        Self {
            config,
            use_hnsw: RwLock::new(false),
            linear: RwLock::new(HashMap::new()),
            graph: RwLock::new(None),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    /// Get the dimension of vectors in this store
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Get the distance metric used by this store
    pub fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    /// Add a vector to the store
    ///
    /// Rejects vectors of the wrong dimension and ids that are already
    /// present. Reaching the switch threshold triggers migration before
    /// the call returns.
    pub async fn add(
        &self,
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: Option<Metadata>,
    ) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(VectorError::InvalidInput(
                "vector id must not be empty".to_string(),
            ));
        }
        if vector.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }

        // The mode lock is held across the table write so migration cannot
        // slip between the mode check and the insert.
        let migrate = {
            let mode = self.use_hnsw.read().await;
            if *mode {
                let mut graph = self.graph.write().await;
                let index = graph.as_mut().ok_or_else(|| {
                    VectorError::IndexError("store is in HNSW mode without an index".to_string())
                })?;
                if index.get_node(&id).is_some() {
                    return Err(VectorError::AlreadyExists(id));
                }
                index.insert(id.clone(), &vector)?;
                false
            } else {
                let mut linear = self.linear.write().await;
                if linear.contains_key(&id) {
                    return Err(VectorError::AlreadyExists(id));
                }
                linear.insert(id.clone(), vector);
                linear.len() >= self.config.switch_threshold
            }
        };

        if let Some(meta) = metadata {
            self.metadata.write().await.insert(id, meta);
        }

        if migrate {
            self.migrate().await;
        }
        Ok(())
    }

    /// Get a stored vector by id
    pub async fn get(&self, id: &str) -> Result<VectorEntry> {
        // Lock order: mode first, then the active table, then metadata
        let vector = {
            let mode = self.use_hnsw.read().await;
            if *mode {
                let graph = self.graph.read().await;
                let index = graph.as_ref().ok_or_else(|| {
                    VectorError::IndexError("store is in HNSW mode without an index".to_string())
                })?;
                index
                    .get_node(id)
                    .map(|node| node.vector().to_vec())
                    .ok_or_else(|| VectorError::NotFound(id.to_string()))?
            } else {
                let linear = self.linear.read().await;
                linear
                    .get(id)
                    .cloned()
                    .ok_or_else(|| VectorError::NotFound(id.to_string()))?
            }
        };

        let metadata = self.metadata.read().await.get(id).cloned();
        Ok(VectorEntry {
            id: id.to_string(),
            vector,
            metadata,
        })
    }

    /// Delete a vector from the store
    pub async fn delete(&self, id: &str) -> Result<()> {
        {
            let mode = self.use_hnsw.read().await;
            if *mode {
                let mut graph = self.graph.write().await;
                let index = graph.as_mut().ok_or_else(|| {
                    VectorError::IndexError("store is in HNSW mode without an index".to_string())
                })?;
                index.delete(id)?;
            } else {
                let mut linear = self.linear.write().await;
                linear
                    .remove(id)
                    .ok_or_else(|| VectorError::NotFound(id.to_string()))?;
            }
        }

        self.metadata.write().await.remove(id);
        Ok(())
    }

    /// Search for the k most similar vectors
    ///
    /// Results are sorted by descending score. An empty store yields an
    /// empty result list in either mode.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Err(VectorError::InvalidInput("k must be positive".to_string()));
        }
        if query.len() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }

        let mut results = {
            let mode = self.use_hnsw.read().await;
            if *mode {
                let graph = self.graph.read().await;
                let index = graph.as_ref().ok_or_else(|| {
                    VectorError::IndexError("store is in HNSW mode without an index".to_string())
                })?;
                match index.search(query, k) {
                    Ok(neighbors) => neighbors
                        .into_iter()
                        .map(|n| SearchResult {
                            id: n.id,
                            vector: n.vector,
                            metadata: None,
                            score: self.config.metric.similarity(n.distance),
                            metric: self.config.metric,
                        })
                        .collect(),
                    // Deleting every vector leaves an empty graph; the
                    // store keeps behaving like an empty linear table
                    Err(VectorError::IndexEmpty) => Vec::new(),
                    Err(err) => return Err(err),
                }
            } else {
                let linear = self.linear.read().await;
                let mut scored: Vec<SearchResult> = linear
                    .iter()
                    .map(|(id, vector)| {
                        let distance = self.config.metric.distance(query, vector);
                        SearchResult {
                            id: id.clone(),
                            vector: vector.clone(),
                            metadata: None,
                            score: self.config.metric.similarity(distance),
                            metric: self.config.metric,
                        }
                    })
                    .collect();
                scored.sort();
                scored.truncate(k);
                scored
            }
        };

        if !results.is_empty() {
            let metadata = self.metadata.read().await;
            for result in &mut results {
                result.metadata = metadata.get(&result.id).cloned();
            }
        }
        Ok(results)
    }

    /// Get the number of vectors in the store
    pub async fn len(&self) -> usize {
        let mode = self.use_hnsw.read().await;
        if *mode {
            self.graph.read().await.as_ref().map_or(0, HnswIndex::len)
        } else {
            self.linear.read().await.len()
        }
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether queries are currently served by the HNSW index
    pub async fn is_using_hnsw(&self) -> bool {
        *self.use_hnsw.read().await
    }

    /// Statistics for the HNSW index, once the store has migrated
    pub async fn index_stats(&self) -> Option<HnswStats> {
        self.graph.read().await.as_ref().map(HnswIndex::stats)
    }

    /// Remove every vector and return to linear mode
    pub async fn clear(&self) {
        let mut mode = self.use_hnsw.write().await;
        self.linear.write().await.clear();
        *self.graph.write().await = None;
        self.metadata.write().await.clear();
        *mode = false;
    }

    /// Move every linear entry into a freshly built HNSW index
    ///
    /// Per-entry failures are logged and skipped; if nothing could be
    /// indexed the store stays in linear mode. Runs at most once.
    async fn migrate(&self) {
        let mut mode = self.use_hnsw.write().await;
        if *mode {
            return;
        }

        let snapshot: Vec<(String, Vec<f32>)> = {
            let linear = self.linear.read().await;
            let mut entries: Vec<_> = linear
                .iter()
                .map(|(id, vector)| (id.clone(), vector.clone()))
                .collect();
            // Deterministic build order keeps repeated migrations of the
            // same data structurally comparable
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries
        };

        tracing::info!(
            count = snapshot.len(),
            threshold = self.config.switch_threshold,
            "migrating store from linear scan to HNSW"
        );

        let mut index = HnswIndex::new(self.config.hnsw.clone(), self.config.metric);
        let mut inserted = 0usize;
        for (id, vector) in &snapshot {
            match index.insert(id.clone(), vector) {
                Ok(()) => inserted += 1,
                Err(err) => {
                    tracing::warn!(id = %id, error = %err, "skipping entry during migration");
                }
            }
        }

        if inserted == 0 && !snapshot.is_empty() {
            tracing::warn!("migration produced an empty index, staying in linear mode");
            return;
        }

        *self.graph.write().await = Some(index);
        self.linear.write().await.clear();
        *mode = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_threshold(threshold: usize) -> VectorStore {
        VectorStore::new(
            VectorStoreConfig::new(3, DistanceMetric::Cosine).with_switch_threshold(threshold),
        )
    }

    #[tokio::test]
    async fn test_store_creation() {
        let store = VectorStore::new(VectorStoreConfig::new(128, DistanceMetric::Cosine));
        assert_eq!(store.dimension(), 128);
        assert_eq!(store.metric(), DistanceMetric::Cosine);
        assert_eq!(store.config().switch_threshold, 100);
        assert_eq!(store.len().await, 0);
        assert!(store.is_empty().await);
        assert!(!store.is_using_hnsw().await);
    }

    #[tokio::test]
    async fn test_add_dimension_mismatch() {
        let store = store_with_threshold(100);
        let result = store.add("v1", vec![1.0, 0.0], None).await;
        assert!(matches!(
            result,
            Err(VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_add_empty_id() {
        let store = store_with_threshold(100);
        let result = store.add("", vec![1.0, 0.0, 0.0], None).await;
        assert!(matches!(result, Err(VectorError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_add_duplicate_id() {
        let store = store_with_threshold(100);
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();
        let result = store.add("v1", vec![0.0, 1.0, 0.0], None).await;
        assert!(matches!(result, Err(VectorError::AlreadyExists(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_id_after_migration() {
        let store = store_with_threshold(2);
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();
        store.add("v2", vec![0.0, 1.0, 0.0], None).await.unwrap();
        assert!(store.is_using_hnsw().await);

        let result = store.add("v1", vec![0.0, 0.0, 1.0], None).await;
        assert!(matches!(result, Err(VectorError::AlreadyExists(_))));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let store = store_with_threshold(100);
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();

        let entry = store.get("v1").await.unwrap();
        assert_eq!(entry.vector, vec![1.0, 0.0, 0.0]);

        store.delete("v1").await.unwrap();
        assert!(matches!(
            store.get("v1").await,
            Err(VectorError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("v1").await,
            Err(VectorError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let store = store_with_threshold(100);
        let mut meta = Metadata::new();
        meta.insert("title".to_string(), serde_json::json!("first doc"));
        store
            .add("v1", vec![1.0, 0.0, 0.0], Some(meta))
            .await
            .unwrap();

        let entry = store.get("v1").await.unwrap();
        assert_eq!(entry.metadata.unwrap()["title"], "first doc");

        let results = store.search(&[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].metadata.as_ref().unwrap()["title"], "first doc");
    }

    #[tokio::test]
    async fn test_linear_search_ranks_by_similarity() {
        let store = store_with_threshold(100);
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();
        store.add("v2", vec![0.0, 1.0, 0.0], None).await.unwrap();
        store.add("v3", vec![0.0, 0.0, 1.0], None).await.unwrap();

        let results = store.search(&[0.9, 0.1, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "v1");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_search_empty_store() {
        let store = store_with_threshold(100);
        let results = store.search(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_invalid_k() {
        let store = store_with_threshold(100);
        assert!(matches!(
            store.search(&[1.0, 0.0, 0.0], 0).await,
            Err(VectorError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_migration_at_threshold() {
        let store = store_with_threshold(10);

        for i in 0..9 {
            let angle = i as f32 * 0.3;
            store
                .add(format!("v{i}"), vec![angle.cos(), angle.sin(), 0.1], None)
                .await
                .unwrap();
        }
        assert!(!store.is_using_hnsw().await);
        assert_eq!(store.len().await, 9);

        store.add("v9", vec![0.5, 0.5, 0.5], None).await.unwrap();
        assert!(store.is_using_hnsw().await);
        assert_eq!(store.len().await, 10);

        // Every previously added id is still retrievable
        for i in 0..10 {
            let entry = store.get(&format!("v{i}")).await.unwrap();
            assert_eq!(entry.id, format!("v{i}"));
        }

        // Search returns the whole collection when k covers it
        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn test_migration_is_one_way() {
        let store = store_with_threshold(3);
        for i in 0..3 {
            store
                .add(format!("v{i}"), vec![i as f32, 1.0, 0.0], None)
                .await
                .unwrap();
        }
        assert!(store.is_using_hnsw().await);

        // Deleting below the threshold does not revert the mode
        store.delete("v0").await.unwrap();
        store.delete("v1").await.unwrap();
        assert!(store.is_using_hnsw().await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_search_after_emptying_migrated_store() {
        let store = store_with_threshold(2);
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();
        store.add("v2", vec![0.0, 1.0, 0.0], None).await.unwrap();
        store.delete("v1").await.unwrap();
        store.delete("v2").await.unwrap();

        assert_eq!(store.len().await, 0);
        let results = store.search(&[1.0, 0.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_scores_agree_across_modes() {
        let vectors: Vec<(String, Vec<f32>)> = (0..8)
            .map(|i| {
                let angle = i as f32 * 0.4;
                (
                    format!("v{i}"),
                    vec![angle.cos(), angle.sin(), 0.2 * i as f32],
                )
            })
            .collect();

        let linear_store = VectorStore::new(
            VectorStoreConfig::new(3, DistanceMetric::Euclidean).with_switch_threshold(100),
        );
        let hnsw_store = VectorStore::new(
            VectorStoreConfig::new(3, DistanceMetric::Euclidean).with_switch_threshold(8),
        );
        for (id, vector) in &vectors {
            linear_store.add(id, vector.clone(), None).await.unwrap();
            hnsw_store.add(id, vector.clone(), None).await.unwrap();
        }
        assert!(!linear_store.is_using_hnsw().await);
        assert!(hnsw_store.is_using_hnsw().await);

        let query = [1.0, 0.0, 0.0];
        let linear_results = linear_store.search(&query, 3).await.unwrap();
        let hnsw_results = hnsw_store.search(&query, 3).await.unwrap();

        let linear_ids: Vec<&str> = linear_results.iter().map(|r| r.id.as_str()).collect();
        let hnsw_ids: Vec<&str> = hnsw_results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(linear_ids, hnsw_ids);
        for (a, b) in linear_results.iter().zip(&hnsw_results) {
            assert!((a.score - b.score).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_clear_resets_to_linear() {
        let store = store_with_threshold(2);
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();
        store.add("v2", vec![0.0, 1.0, 0.0], None).await.unwrap();
        assert!(store.is_using_hnsw().await);

        store.clear().await;
        assert!(!store.is_using_hnsw().await);
        assert_eq!(store.len().await, 0);
        assert!(store.index_stats().await.is_none());

        // The store is usable again in linear mode
        store.add("v1", vec![1.0, 0.0, 0.0], None).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_index_stats_after_migration() {
        let store = store_with_threshold(4);
        for i in 0..4 {
            store
                .add(format!("v{i}"), vec![i as f32, 0.0, 1.0], None)
                .await
                .unwrap();
        }
        let stats = store.index_stats().await.unwrap();
        assert_eq!(stats.node_count, 4);
        assert!(stats.entry_point.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_adds_cross_threshold() {
        use std::sync::Arc;

        let store = Arc::new(
            VectorStore::new(
                VectorStoreConfig::new(3, DistanceMetric::Cosine).with_switch_threshold(16),
            ),
        );

        let mut handles = Vec::new();
        for t in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..8 {
                    let angle = (t * 8 + i) as f32 * 0.2;
                    store
                        .add(
                            format!("t{t}-v{i}"),
                            vec![angle.cos(), angle.sin(), 1.0],
                            None,
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 32);
        assert!(store.is_using_hnsw().await);
        for t in 0..4 {
            for i in 0..8 {
                store.get(&format!("t{t}-v{i}")).await.unwrap();
            }
        }
    }
}
