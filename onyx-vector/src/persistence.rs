//! JSON persistence for the HNSW graph
//!
//! The graph is saved as a single JSON document: index parameters, the
//! entry point, and every node with its per-layer neighbor lists. Saving
//! goes through a temporary file and an atomic rename so a crash never
//! leaves a half-written index behind. Loading runs in two passes (create
//! nodes, then resolve links) and tolerates dangling neighbor references
//! by dropping them.

use crate::hnsw::{HnswIndex, HnswNode};
use crate::{Result, VectorError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// On-disk layout of the whole graph
#[derive(Debug, Serialize, Deserialize)]
struct GraphDocument {
    m: usize,
    ef_construction: usize,
    ml: f64,
    max_level: usize,
    entry_point_id: Option<String>,
    nodes: Vec<NodeRecord>,
}

/// On-disk layout of one node
#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    vector: Vec<f32>,
    level: usize,
    /// Layer (as a string key) -> neighbor ids, sorted for stable output
    neighbors: HashMap<String, Vec<String>>,
}

impl HnswIndex {
    /// Save the graph to a JSON file
    ///
    /// Writes to `<path>.tmp` first and renames into place, so readers
    /// never observe a partially written file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let mut nodes: Vec<NodeRecord> = self
            .nodes
            .values()
            .map(|node| {
                let mut neighbors = HashMap::new();
                for layer in 0..=node.level() {
                    let mut ids: Vec<String> = node
                        .neighbors_at(layer)
                        .map(|set| set.iter().cloned().collect())
                        .unwrap_or_default();
                    ids.sort();
                    neighbors.insert(layer.to_string(), ids);
                }
                NodeRecord {
                    id: node.id().to_string(),
                    vector: node.vector().to_vec(),
                    level: node.level(),
                    neighbors,
                }
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let document = GraphDocument {
            m: self.config().m,
            ef_construction: self.config().ef_construction,
            ml: self.config().ml,
            max_level: self.max_level,
            entry_point_id: self.entry_point.clone(),
            nodes,
        };

        let tmp_path = path.with_extension("tmp");
        let bytes = serde_json::to_vec(&document)?;
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a graph from a JSON file, replacing all existing state
    ///
    /// The distance metric and `ef_search` are runtime settings and are
    /// kept from the current configuration; the structural parameters
    /// (`m`, `ef_construction`, `ml`) come from the file. Neighbor ids
    /// that do not resolve to a node are dropped with a warning, which
    /// makes loading tolerant of mildly corrupted files.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let document: GraphDocument = serde_json::from_slice(&bytes)?;

        let mut nodes: HashMap<String, HnswNode> = HashMap::with_capacity(document.nodes.len());

        // First pass: create every node so references can be resolved
        for record in &document.nodes {
            nodes.insert(
                record.id.clone(),
                HnswNode::from_parts(record.id.clone(), record.vector.clone(), record.level),
            );
        }

        // Second pass: resolve neighbor id lists against the node table
        for record in &document.nodes {
            for (layer_key, neighbor_ids) in &record.neighbors {
                let Ok(layer) = layer_key.parse::<usize>() else {
                    tracing::warn!(
                        node = %record.id,
                        layer = %layer_key,
                        "dropping neighbor list with unparseable layer key"
                    );
                    continue;
                };
                if layer > record.level {
                    tracing::warn!(
                        node = %record.id,
                        layer,
                        "dropping neighbor list above the node's level"
                    );
                    continue;
                }
                let resolved: HashSet<String> = neighbor_ids
                    .iter()
                    .filter(|nid| {
                        let known = nodes.contains_key(*nid) && *nid != &record.id;
                        if !known {
                            tracing::warn!(
                                node = %record.id,
                                neighbor = %nid,
                                layer,
                                "dropping unresolved neighbor reference"
                            );
                        }
                        known
                    })
                    .cloned()
                    .collect();
                if let Some(node) = nodes.get_mut(&record.id) {
                    node.set_neighbors_for_load(layer, resolved);
                }
            }
        }

        // Validate the entry point; fall back to the highest surviving
        // node if the recorded one is gone
        let entry_point = match document.entry_point_id {
            Some(id) if nodes.contains_key(&id) => Some(id),
            Some(id) => {
                tracing::warn!(entry_point = %id, "recorded entry point missing, reassigning");
                nodes
                    .values()
                    .max_by(|a, b| {
                        a.level()
                            .cmp(&b.level())
                            .then_with(|| b.id().cmp(a.id()))
                    })
                    .map(|n| n.id().to_string())
            }
            None => None,
        };
        if entry_point.is_none() && !nodes.is_empty() {
            return Err(VectorError::IndexError(
                "index file has nodes but no entry point".to_string(),
            ));
        }
        let max_level = entry_point
            .as_ref()
            .and_then(|id| nodes.get(id))
            .map_or(0, HnswNode::level);

        let mut config = self.config().clone();
        config.m = document.m;
        config.m_max0 = document.m * 2;
        config.ef_construction = document.ef_construction;
        config.ml = document.ml;

        self.replace_state(config, nodes, entry_point, max_level);
        tracing::info!(
            nodes = self.len(),
            max_level = self.max_level,
            path = %path.display(),
            "loaded HNSW index"
        );
        Ok(())
    }
}
