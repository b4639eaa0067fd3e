//! Property-based tests for vector operations
//!
//! Uses proptest to verify index and store invariants with random inputs

use onyx_vector::{DistanceMetric, HnswConfig, HnswIndex, VectorStore, VectorStoreConfig};
use proptest::prelude::*;
use std::collections::HashSet;

/// Strategy for generating valid vectors (f32 arrays with reasonable values)
fn vector_strategy(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-1.0f32..1.0f32, dim..=dim)
}

/// Strategy for generating vector IDs (hex strings)
fn vector_id_strategy() -> impl Strategy<Value = String> {
    any::<u64>().prop_map(|n| format!("vec-{n:016x}"))
}

proptest! {
    /// Test that insert and search finds the inserted vector
    /// Property: After inserting a vector, searching for it should return it as a result
    #[test]
    fn test_insert_and_search_consistency(
        vectors in prop::collection::vec(
            (vector_id_strategy(), vector_strategy(32)),
            1..50
        )
    ) {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Cosine);

        let mut inserted_ids = HashSet::new();

        // Insert all vectors
        for (id, vector) in &vectors {
            index.insert(id.clone(), vector)?;
            inserted_ids.insert(id.clone());
        }

        prop_assert_eq!(index.len(), inserted_ids.len());

        // Search for each vector - the results must all be inserted ids
        for (_, vector) in &vectors {
            let results = index.search(vector, 1)?;

            prop_assert!(!results.is_empty(), "Search should return at least one result");
            prop_assert!(
                inserted_ids.contains(&results[0].id),
                "Result should be one of the inserted vectors"
            );
        }
    }

    /// Test that the graph invariants hold after a bulk insert
    /// Property: links are bidirectional, no dangling references, levels bounded
    #[test]
    fn test_graph_integrity_after_inserts(
        vectors in prop::collection::vec(
            (vector_id_strategy(), vector_strategy(16)),
            1..60
        )
    ) {
        let mut index = HnswIndex::new(HnswConfig::fast(), DistanceMetric::Euclidean);
        for (id, vector) in &vectors {
            index.insert(id.clone(), vector)?;
        }

        let violations = index.verify_integrity();
        prop_assert!(violations.is_empty(), "integrity violations: {:?}", violations);
    }

    /// Test that delete removes vectors from search results
    /// Property: After deleting a vector, it should not appear in search results
    #[test]
    fn test_delete_removes_from_search(
        id in vector_id_strategy(),
        vector in vector_strategy(16),
        other_vectors in prop::collection::vec(
            (vector_id_strategy(), vector_strategy(16)),
            5..20
        )
    ) {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Euclidean);

        // Insert the target vector
        index.insert(id.clone(), &vector)?;

        // Insert other vectors
        for (other_id, other_vec) in &other_vectors {
            if *other_id != id {
                index.insert(other_id.clone(), other_vec)?;
            }
        }

        // Verify it exists
        let results_before = index.search(&vector, 10)?;
        prop_assert!(
            results_before.iter().any(|r| r.id == id),
            "Vector should be found before deletion"
        );

        // Delete the target vector
        index.delete(&id)?;

        // Search again - should not find it, and the graph stays sound
        let results_after = index.search(&vector, 10)?;
        prop_assert!(
            !results_after.iter().any(|r| r.id == id),
            "Vector should not be found after deletion"
        );
        prop_assert!(index.verify_integrity().is_empty());
    }

    /// Test that search returns at most k results
    /// Property: search(k) should return at most k results
    #[test]
    fn test_search_returns_at_most_k(
        query in vector_strategy(8),
        vectors in prop::collection::vec(
            (vector_id_strategy(), vector_strategy(8)),
            10..100
        ),
        k in 1usize..20usize
    ) {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Cosine);

        // Insert all vectors
        for (id, vector) in vectors {
            index.insert(id, &vector)?;
        }

        // Search
        let results = index.search(&query, k)?;

        prop_assert!(
            results.len() <= k,
            "Should return at most k results (got {}, expected <= {})",
            results.len(),
            k
        );
    }

    /// Test that search results are sorted by distance
    /// Property: Results should be in ascending order by distance (best first)
    #[test]
    fn test_search_results_sorted(
        query in vector_strategy(16),
        vectors in prop::collection::vec(
            (vector_id_strategy(), vector_strategy(16)),
            10..50
        )
    ) {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Euclidean);

        // Insert all vectors
        for (id, vector) in vectors {
            index.insert(id, &vector)?;
        }

        // Search
        let results = index.search(&query, 10)?;

        // Verify results are sorted
        for i in 1..results.len() {
            prop_assert!(
                results[i - 1].distance <= results[i].distance,
                "Results should be sorted by distance (ascending)"
            );
        }
    }

    /// Test that identical vectors have distance 0 (or very small for Cosine)
    /// Property: Searching for an inserted vector should return it with minimal distance
    #[test]
    fn test_self_similarity(
        id in vector_id_strategy(),
        vector in vector_strategy(32)
    ) {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Euclidean);

        // Insert vector
        index.insert(id, &vector)?;

        // Search for itself
        let results = index.search(&vector, 1)?;

        prop_assert!(!results.is_empty(), "Should find at least one result");
        prop_assert!(
            results[0].distance < 0.01,
            "Self-distance should be near zero (distance: {})",
            results[0].distance
        );
    }

    /// Test that re-inserting an id never mutates the graph
    /// Property: Duplicate inserts succeed and leave the stored vector unchanged
    #[test]
    fn test_duplicate_id_is_idempotent(
        id in vector_id_strategy(),
        vector1 in vector_strategy(16),
        vector2 in vector_strategy(16)
    ) {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Cosine);

        index.insert(id.clone(), &vector1)?;
        index.insert(id.clone(), &vector2)?;

        prop_assert_eq!(index.len(), 1);
        let node = index.get_node(&id).expect("node must exist");
        prop_assert_eq!(node.vector(), vector1.as_slice());
    }

    /// Test the hybrid store's mode switch
    /// Property: below the threshold the store scans linearly, at the
    /// threshold it migrates, and every id stays retrievable either way
    #[test]
    fn test_store_mode_matches_threshold(
        count in 1usize..30,
        threshold in 2usize..30
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        rt.block_on(async {
            let store = VectorStore::new(
                VectorStoreConfig::new(4, DistanceMetric::Cosine)
                    .with_switch_threshold(threshold),
            );
            for i in 0..count {
                let f = i as f32;
                store
                    .add(format!("v{i}"), vec![f.cos(), f.sin(), 1.0, f], None)
                    .await
                    .unwrap();
            }

            assert_eq!(store.is_using_hnsw().await, count >= threshold);
            assert_eq!(store.len().await, count);
            for i in 0..count {
                store.get(&format!("v{i}")).await.unwrap();
            }
        });
    }
}

#[cfg(test)]
mod deterministic_tests {
    use super::*;
    use rand::Rng;
    use tempfile::TempDir;
    use uuid::Uuid;

    /// Test edge case: single vector
    #[test]
    fn test_single_vector() {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Euclidean);

        let vector = vec![1.0, 2.0, 3.0];
        index.insert("only", &vector).unwrap();

        let results = index.search(&vector, 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "only");
    }

    /// Test edge case: zero vector under cosine
    #[test]
    fn test_zero_vector_cosine() {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Cosine);

        index.insert("zero", &vec![0.0; 16]).unwrap();
        index.insert("unit", &{
            let mut v = vec![0.0; 16];
            v[0] = 1.0;
            v
        })
        .unwrap();

        // Zero-norm pairs land at the orthogonal midpoint rather than NaN
        let results = index.search(&vec![0.0; 16], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.distance.is_finite()));
    }

    /// Test edge case: normalized vectors for Cosine similarity
    #[test]
    fn test_normalized_vectors() {
        let config = HnswConfig::default();
        let mut index = HnswIndex::new(config, DistanceMetric::Cosine);

        // Same direction, different magnitudes
        index.insert("v1", &[1.0, 1.0, 1.0]).unwrap();
        index.insert("v2", &[2.0, 2.0, 2.0]).unwrap();

        // Both should be very close in cosine space
        let results = index.search(&[1.0, 1.0, 1.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].distance < 0.1);
        assert!(results[1].distance < 0.1);
    }

    /// Test different distance metrics produce different scores
    #[test]
    fn test_different_metrics() {
        let vector1 = vec![1.0, 0.0];
        let vector2 = vec![0.0, 1.0];
        let query = vec![1.0, 1.0];

        let mut index_cosine = HnswIndex::new(HnswConfig::default(), DistanceMetric::Cosine);
        index_cosine.insert("v1", &vector1).unwrap();
        index_cosine.insert("v2", &vector2).unwrap();
        let results_cosine = index_cosine.search(&query, 2).unwrap();

        let mut index_euclidean =
            HnswIndex::new(HnswConfig::default(), DistanceMetric::Euclidean);
        index_euclidean.insert("v1", &vector1).unwrap();
        index_euclidean.insert("v2", &vector2).unwrap();
        let results_euclidean = index_euclidean.search(&query, 2).unwrap();

        assert!(results_cosine[0].distance != results_euclidean[0].distance);
    }

    /// Fifty random 128-d vectors survive a save/load round trip with
    /// identical top-5 results for a fixed query
    #[test]
    fn test_save_load_search_equality() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.json");

        let mut rng = rand::rng();
        let mut index = HnswIndex::new(HnswConfig::default(), DistanceMetric::Cosine);
        for _ in 0..50 {
            let id = Uuid::new_v4().to_string();
            let vector: Vec<f32> = (0..128).map(|_| rng.random_range(-1.0..1.0)).collect();
            index.insert(id, &vector).unwrap();
        }
        index.save(&path).unwrap();

        let mut restored = HnswIndex::new(HnswConfig::default(), DistanceMetric::Cosine);
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), 50);

        let query: Vec<f32> = (0..128).map(|i| ((i * 7) % 23) as f32 / 23.0 - 0.5).collect();
        let before: Vec<String> = index
            .search(&query, 5)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        let after: Vec<String> = restored
            .search(&query, 5)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(before, after);
    }
}
