//! HNSW (Hierarchical Navigable Small World) index implementation
//!
//! HNSW is a graph-based algorithm for approximate nearest neighbor search.
//! It builds a multi-layer graph where:
//! - Layer 0 contains all vectors
//! - Higher layers contain progressively fewer vectors
//! - Each vector connects to M neighbors at each layer (2M at layer 0)
//!
//! Search starts at the top layer and greedily navigates to the nearest
//! neighbors, descending through layers until reaching layer 0.
//!
//! Links are kept bidirectional at every layer: inserting adds both
//! directions, and pruning an overfull neighbor list severs the dropped
//! links on both sides.

use crate::{DistanceMetric, Neighbor, Result, VectorError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Hard cap on the layer a node can be promoted to
const MAX_LEVEL_CAP: usize = 16;

/// Configuration for HNSW index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of bi-directional links per element per layer (M)
    /// Typical values: 5-48
    /// Higher M = better recall, more memory, slower insertions
    pub m: usize,

    /// Maximum number of connections for layer 0 (typically M * 2)
    pub m_max0: usize,

    /// Size of the dynamic candidate list during construction (ef_construction)
    /// Typical values: 100-500
    /// Higher ef_construction = better quality index, slower construction
    pub ef_construction: usize,

    /// Size of the dynamic candidate list during search (ef_search)
    /// Typical values: 100-500
    /// Higher ef_search = better recall, slower search
    pub ef_search: usize,

    /// Normalization factor for level selection, fixed at 1/ln(2) so a node
    /// is promoted to each next layer with probability 1/2
    pub ml: f64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        let m = 16;
        Self {
            m,
            m_max0: m * 2,
            ef_construction: 200,
            ef_search: 100,
            ml: 1.0 / std::f64::consts::LN_2,
        }
    }
}

impl HnswConfig {
    /// Create a fast configuration (less accuracy, faster search)
    pub fn fast() -> Self {
        let m = 8;
        Self {
            m,
            m_max0: m * 2,
            ef_construction: 100,
            ef_search: 50,
            ml: 1.0 / std::f64::consts::LN_2,
        }
    }

    /// Create a balanced configuration (default)
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Create a high-quality configuration (better accuracy, slower search)
    pub fn high_quality() -> Self {
        let m = 32;
        Self {
            m,
            m_max0: m * 2,
            ef_construction: 400,
            ef_search: 200,
            ml: 1.0 / std::f64::consts::LN_2,
        }
    }
}

/// A node in the HNSW graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswNode {
    /// Vector ID
    id: String,
    /// The node's vector data
    vector: Vec<f32>,
    /// Layer at which this node was inserted
    level: usize,
    /// Connections at each layer (index = layer, one set per layer 0..=level)
    connections: Vec<HashSet<String>>,
}

impl HnswNode {
    fn new(id: String, vector: Vec<f32>, level: usize) -> Self {
        let connections = (0..=level).map(|_| HashSet::new()).collect();
        Self {
            id,
            vector,
            level,
            connections,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Neighbor ids at the given layer, or None if the node does not
    /// participate in that layer
    pub fn neighbors_at(&self, layer: usize) -> Option<&HashSet<String>> {
        self.connections.get(layer)
    }

    fn link(&mut self, layer: usize, peer: String) {
        if let Some(set) = self.connections.get_mut(layer) {
            set.insert(peer);
        }
    }

    fn unlink(&mut self, layer: usize, peer: &str) {
        if let Some(set) = self.connections.get_mut(layer) {
            set.remove(peer);
        }
    }

    fn set_neighbors(&mut self, layer: usize, neighbors: HashSet<String>) {
        if let Some(set) = self.connections.get_mut(layer) {
            *set = neighbors;
        }
    }

    /// Rebuild a node from persisted parts (links are attached separately
    /// in the load's second pass)
    pub(crate) fn from_parts(id: String, vector: Vec<f32>, level: usize) -> Self {
        Self::new(id, vector, level)
    }

    pub(crate) fn set_neighbors_for_load(&mut self, layer: usize, neighbors: HashSet<String>) {
        self.set_neighbors(layer, neighbors);
    }
}

/// Statistics describing the current shape of the graph
#[derive(Debug, Clone, Serialize)]
pub struct HnswStats {
    pub node_count: usize,
    pub max_level: usize,
    pub m: usize,
    pub ef_construction: usize,
    pub entry_point: Option<String>,
    /// Average neighbor-list size per layer (index = layer)
    pub avg_connections_per_level: Vec<f64>,
}

/// HNSW index for fast approximate nearest neighbor search
pub struct HnswIndex {
    /// Configuration
    config: HnswConfig,
    /// Distance metric
    metric: DistanceMetric,
    /// All nodes in the graph, keyed by id
    pub(crate) nodes: HashMap<String, HnswNode>,
    /// Entry point (a node at the highest layer)
    pub(crate) entry_point: Option<String>,
    /// Maximum layer in the graph
    pub(crate) max_level: usize,
}

impl HnswIndex {
    /// Create a new HNSW index
    pub fn new(config: HnswConfig, metric: DistanceMetric) -> Self {
        Self {
            config,
            metric,
            nodes: HashMap::new(),
            entry_point: None,
            max_level: 0,
        }
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by id
    pub fn get_node(&self, id: &str) -> Option<&HnswNode> {
        self.nodes.get(id)
    }

    /// Insert a vector into the index
    ///
    /// Idempotent on id: re-inserting an existing id succeeds without
    /// touching the graph.
    pub fn insert(&mut self, id: impl Into<String>, vector: &[f32]) -> Result<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(VectorError::InvalidInput(
                "vector id must not be empty".to_string(),
            ));
        }
        if vector.is_empty() {
            return Err(VectorError::InvalidInput(
                "vector must not be empty".to_string(),
            ));
        }
        if self.nodes.contains_key(&id) {
            return Ok(());
        }
        if let Some(entry_id) = &self.entry_point
            && let Some(entry) = self.nodes.get(entry_id)
            && entry.vector.len() != vector.len()
        {
            return Err(VectorError::DimensionMismatch {
                expected: entry.vector.len(),
                actual: vector.len(),
            });
        }

        // Select a layer for this element
        let level = self.random_level();

        // If this is the first element, it becomes the entry point
        let Some(entry_id) = self.entry_point.clone() else {
            self.nodes
                .insert(id.clone(), HnswNode::new(id.clone(), vector.to_vec(), level));
            self.entry_point = Some(id);
            self.max_level = level;
            return Ok(());
        };

        // The node goes into the table up front so pruning can sever links
        // through the table symmetrically.
        self.nodes
            .insert(id.clone(), HnswNode::new(id.clone(), vector.to_vec(), level));

        // Greedy descent with beam width 1 through the layers above the
        // new node's level, relocating the entry to a closer node.
        let mut current = vec![entry_id];
        for layer in ((level + 1)..=self.max_level).rev() {
            current = self
                .search_layer(vector, &current, 1, layer)
                .into_iter()
                .map(|(_, nid)| nid)
                .collect();
        }

        // For each layer the new node participates in, find a candidate
        // pool, pick the nearest, and link both directions.
        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates =
                self.search_layer(vector, &current, self.config.ef_construction, layer);
            let candidate_ids: Vec<String> =
                candidates.into_iter().map(|(_, nid)| nid).collect();

            let cap = self.max_connections(layer);
            let selected = self.select_neighbors(&candidate_ids, cap, vector);

            for neighbor_id in &selected {
                self.add_link(&id, neighbor_id, layer);
                self.prune_connections(neighbor_id, layer);
            }

            current = candidate_ids;
        }

        // Update entry point if this node landed on a higher layer
        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(id);
        }

        Ok(())
    }

    /// Search for k nearest neighbors using the configured `ef_search`
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.search_with_ef(query, k, self.config.ef_search)
    }

    /// Search for k nearest neighbors with an explicit candidate-list size
    ///
    /// `ef` is raised to at least `k`.
    pub fn search_with_ef(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<Neighbor>> {
        let found = self.descend_and_scan(query, k, ef)?;
        Ok(self.to_neighbors(found, k))
    }

    /// Search for all neighbors within `max_distance` of the query
    pub fn range_search(&self, query: &[f32], max_distance: f32) -> Result<Vec<Neighbor>> {
        self.range_search_with_ef(query, max_distance, self.config.ef_search)
    }

    /// Range search with an explicit candidate-list size
    ///
    /// The candidate pool is still bounded by `ef`, so this is approximate
    /// like `search`: vectors beyond the beam are not considered.
    pub fn range_search_with_ef(
        &self,
        query: &[f32],
        max_distance: f32,
        ef: usize,
    ) -> Result<Vec<Neighbor>> {
        let found = self.descend_and_scan(query, 1, ef)?;
        let within: Vec<(f32, String)> = found
            .into_iter()
            .filter(|(dist, _)| *dist <= max_distance)
            .collect();
        let count = within.len();
        Ok(self.to_neighbors(within, count))
    }

    /// Search many queries, returning one result list per query in order
    pub fn batch_search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<Neighbor>>> {
        if queries.is_empty() {
            return Err(VectorError::InvalidInput(
                "query batch must not be empty".to_string(),
            ));
        }
        queries.par_iter().map(|q| self.search(q, k)).collect()
    }

    /// Delete a vector from the index
    ///
    /// Severs every link to the deleted node. If it was the entry point,
    /// the node with the highest surviving level takes over. Deletion does
    /// not reconnect the severed neighbors to each other; collections with
    /// heavy insert/delete churn should periodically rebuild the index.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| VectorError::NotFound(id.to_string()))?;

        // Remove all links pointing back at this node
        for (layer, peers) in node.connections.iter().enumerate() {
            for peer in peers {
                if let Some(peer_node) = self.nodes.get_mut(peer) {
                    peer_node.unlink(layer, id);
                }
            }
        }

        // Reassign the entry point if necessary
        if self.entry_point.as_deref() == Some(id) {
            let replacement = self
                .nodes
                .values()
                .max_by(|a, b| a.level.cmp(&b.level).then_with(|| b.id.cmp(&a.id)));
            match replacement {
                Some(node) => {
                    self.max_level = node.level;
                    self.entry_point = Some(node.id.clone());
                }
                None => {
                    self.max_level = 0;
                    self.entry_point = None;
                }
            }
        }

        Ok(())
    }

    /// Remove all nodes from the index
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.entry_point = None;
        self.max_level = 0;
    }

    /// Report the current shape of the graph
    pub fn stats(&self) -> HnswStats {
        let mut avg_connections_per_level = Vec::new();
        if !self.nodes.is_empty() {
            for layer in 0..=self.max_level {
                let mut total = 0usize;
                let mut count = 0usize;
                for node in self.nodes.values() {
                    if let Some(neighbors) = node.neighbors_at(layer) {
                        total += neighbors.len();
                        count += 1;
                    }
                }
                let avg = if count == 0 {
                    0.0
                } else {
                    total as f64 / count as f64
                };
                avg_connections_per_level.push(avg);
            }
        }
        HnswStats {
            node_count: self.nodes.len(),
            max_level: self.max_level,
            m: self.config.m,
            ef_construction: self.config.ef_construction,
            entry_point: self.entry_point.clone(),
            avg_connections_per_level,
        }
    }

    /// Check structural invariants, returning a list of violations
    ///
    /// An empty list means the graph is sound: every neighbor reference
    /// resolves, every link is bidirectional, no node links to itself, and
    /// no node sits above the graph's maximum layer.
    pub fn verify_integrity(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for node in self.nodes.values() {
            if node.level > self.max_level {
                violations.push(format!(
                    "node {} has level {} above graph max level {}",
                    node.id, node.level, self.max_level
                ));
            }
            for (layer, peers) in node.connections.iter().enumerate() {
                for peer in peers {
                    if peer == &node.id {
                        violations.push(format!("node {} links to itself at layer {layer}", node.id));
                        continue;
                    }
                    match self.nodes.get(peer) {
                        None => violations.push(format!(
                            "node {} references missing neighbor {peer} at layer {layer}",
                            node.id
                        )),
                        Some(peer_node) => {
                            let symmetric = peer_node
                                .neighbors_at(layer)
                                .is_some_and(|set| set.contains(&node.id));
                            if !symmetric {
                                violations.push(format!(
                                    "link {} -> {peer} at layer {layer} is not bidirectional",
                                    node.id
                                ));
                            }
                        }
                    }
                }
            }
        }
        violations
    }

    /// Shared descent for search and range search: greedy descent to layer
    /// 1, then a full beam scan of layer 0
    fn descend_and_scan(&self, query: &[f32], k: usize, ef: usize) -> Result<Vec<(f32, String)>> {
        if k == 0 {
            return Err(VectorError::InvalidInput(
                "k must be positive".to_string(),
            ));
        }
        if query.is_empty() {
            return Err(VectorError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        let Some(entry_id) = self.entry_point.clone() else {
            return Err(VectorError::IndexEmpty);
        };
        if let Some(entry) = self.nodes.get(&entry_id)
            && entry.vector.len() != query.len()
        {
            return Err(VectorError::DimensionMismatch {
                expected: entry.vector.len(),
                actual: query.len(),
            });
        }

        let mut current = vec![entry_id];
        for layer in (1..=self.max_level).rev() {
            current = self
                .search_layer(query, &current, 1, layer)
                .into_iter()
                .map(|(_, nid)| nid)
                .collect();
        }

        let ef = ef.max(k);
        Ok(self.search_layer(query, &current, ef, 0))
    }

    /// Search a single layer for nearest neighbors
    ///
    /// Runs the beam search over two heaps: a min-heap of open candidates
    /// and a max-heap of the best `ef` found so far. Returns up to `ef`
    /// hits sorted by ascending distance, ties broken by id.
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[String],
        ef: usize,
        layer: usize,
    ) -> Vec<(f32, String)> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<(OrderedFloat, String)>> = BinaryHeap::new();
        let mut nearest: BinaryHeap<(OrderedFloat, String)> = BinaryHeap::new();

        // Initialize with entry points
        for ep in entry_points {
            if visited.insert(ep.clone())
                && let Some(node) = self.nodes.get(ep)
            {
                let dist = OrderedFloat(self.metric.distance(query, &node.vector));
                candidates.push(Reverse((dist, ep.clone())));
                nearest.push((dist, ep.clone()));
            }
        }

        while let Some(Reverse((current_dist, current_id))) = candidates.pop() {
            // Once the best list is full and the nearest open candidate is
            // farther than the worst kept result, the scan is done
            if nearest.len() >= ef
                && let Some((farthest, _)) = nearest.peek()
                && current_dist > *farthest
            {
                break;
            }

            // Check all neighbors of the current node at this layer
            if let Some(node) = self.nodes.get(&current_id)
                && let Some(neighbors) = node.neighbors_at(layer)
            {
                for neighbor_id in neighbors {
                    if !visited.insert(neighbor_id.clone()) {
                        continue;
                    }
                    let Some(neighbor) = self.nodes.get(neighbor_id) else {
                        continue;
                    };
                    let dist = OrderedFloat(self.metric.distance(query, &neighbor.vector));
                    let worst = nearest.peek().map(|(d, _)| *d);
                    if nearest.len() < ef || worst.is_none_or(|w| dist < w) {
                        candidates.push(Reverse((dist, neighbor_id.clone())));
                        nearest.push((dist, neighbor_id.clone()));
                        if nearest.len() > ef {
                            nearest.pop();
                        }
                    }
                }
            }
        }

        let mut results: Vec<(OrderedFloat, String)> = nearest.into_iter().collect();
        results.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        results.into_iter().map(|(dist, id)| (dist.0, id)).collect()
    }

    /// Select up to `m` nearest candidates, deterministically
    fn select_neighbors(&self, candidates: &[String], m: usize, query: &[f32]) -> Vec<String> {
        if candidates.len() <= m {
            return candidates.to_vec();
        }

        let mut scored: Vec<(OrderedFloat, &String)> = candidates
            .iter()
            .map(|nid| {
                let dist = self
                    .nodes
                    .get(nid)
                    .map(|n| self.metric.distance(query, &n.vector))
                    .unwrap_or(f32::MAX);
                (OrderedFloat(dist), nid)
            })
            .collect();

        scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        scored.into_iter().take(m).map(|(_, nid)| nid.clone()).collect()
    }

    /// Add a bidirectional link between two nodes at the given layer
    fn add_link(&mut self, a: &str, b: &str, layer: usize) {
        if a == b {
            return;
        }
        if let Some(node) = self.nodes.get_mut(a) {
            node.link(layer, b.to_string());
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.link(layer, a.to_string());
        }
    }

    /// Enforce the connection cap on a node's neighbor list at one layer
    ///
    /// Dropped links are severed on both sides so the symmetry invariant
    /// survives pruning.
    fn prune_connections(&mut self, id: &str, layer: usize) {
        let cap = self.max_connections(layer);
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let Some(neighbors) = node.neighbors_at(layer) else {
            return;
        };
        if neighbors.len() <= cap {
            return;
        }

        let neighbor_ids: Vec<String> = neighbors.iter().cloned().collect();
        let node_vector = node.vector.clone();
        let keep: HashSet<String> = self
            .select_neighbors(&neighbor_ids, cap, &node_vector)
            .into_iter()
            .collect();

        for dropped in neighbor_ids.iter().filter(|n| !keep.contains(*n)) {
            if let Some(peer) = self.nodes.get_mut(dropped) {
                peer.unlink(layer, id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_neighbors(layer, keep);
        }
    }

    fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }

    /// Select a random layer for a new element
    ///
    /// Repeatedly flips a coin with success probability exp(-1/ml); the
    /// number of consecutive successes is the level. At the default ml of
    /// 1/ln(2) this promotes with probability 1/2 per layer.
    fn random_level(&self) -> usize {
        let promote = (-1.0 / self.config.ml).exp();
        let mut level = 0;
        while level < MAX_LEVEL_CAP && rand::random::<f64>() < promote {
            level += 1;
        }
        level
    }

    /// Swap in a freshly loaded graph, dropping all previous state
    pub(crate) fn replace_state(
        &mut self,
        config: HnswConfig,
        nodes: HashMap<String, HnswNode>,
        entry_point: Option<String>,
        max_level: usize,
    ) {
        self.config = config;
        self.nodes = nodes;
        self.entry_point = entry_point;
        self.max_level = max_level;
    }

    fn to_neighbors(&self, found: Vec<(f32, String)>, k: usize) -> Vec<Neighbor> {
        found
            .into_iter()
            .take(k)
            .filter_map(|(distance, id)| {
                self.nodes.get(&id).map(|node| Neighbor {
                    id,
                    vector: node.vector.clone(),
                    distance,
                })
            })
            .collect()
    }
}

/// Wrapper for f32 to make it orderable (for BinaryHeap)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct OrderedFloat(pub(crate) f32);

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}
