//! HNSW (Hierarchical Navigable Small World) approximate nearest-neighbor
//! index (spec §4.4).
//!
//! A multi-layer graph: layer 0 holds every live node with up to `2*m`
//! connections, higher layers hold a shrinking subset with up to `m`
//! connections. Search descends greedily from the top layer to layer 1, then
//! runs a beam search (`search_layer`) at layer 0. Level assignment uses a
//! fixed-seed splitmix64 PRNG plus a monotonic counter so identical insert
//! sequences produce identical graphs (spec §4.4 Determinism).
//!
//! Deletes are soft: a deleted node stays as a graph waypoint (so the graph
//! doesn't fragment) but is excluded from query results (spec §4.4 Soft
//! delete supplement).

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use memora_core::{HnswConfig, MemoraError, MemoraResult, NodeId};
use rustc_hash::FxHashMap;

use super::distance::similarity;

#[derive(Debug, Clone)]
struct HnswNode {
    neighbors: Vec<BTreeSet<NodeId>>,
    max_layer: usize,
    deleted: bool,
}

impl HnswNode {
    fn new(max_layer: usize) -> Self {
        HnswNode {
            neighbors: (0..=max_layer).map(|_| BTreeSet::new()).collect(),
            max_layer,
            deleted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoredId {
    score: f32,
    id: NodeId,
}

impl Eq for ScoredId {}

impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// HNSW graph + embedding storage for a single vector index.
///
/// `m`/`ef_construction`/`ef_search`/`seed` come from `HnswConfig` (spec §6
/// defaults: 16/200/50/42).
pub struct HnswIndex {
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    ml: f64,
    rng_seed: u64,
    rng_counter: u64,
    nodes: BTreeMap<NodeId, HnswNode>,
    vectors: FxHashMap<NodeId, Vec<f32>>,
    entry_point: Option<NodeId>,
    max_level: usize,
    dimension: usize,
}

impl HnswIndex {
    /// Build an empty index for vectors of `dimension` components.
    pub fn new(config: &HnswConfig, dimension: usize) -> Self {
        HnswIndex {
            m: config.m,
            ef_construction: config.ef_construction,
            ef_search: config.ef_search,
            ml: 1.0 / (config.m as f64).ln(),
            rng_seed: config.seed,
            rng_counter: 0,
            nodes: BTreeMap::new(),
            vectors: FxHashMap::default(),
            entry_point: None,
            max_level: 0,
            dimension,
        }
    }

    /// Number of live (non-deleted) vectors.
    pub fn len(&self) -> usize {
        self.nodes.values().filter(|n| !n.deleted).count()
    }

    /// True if the index holds no live vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `id` is present, live or soft-deleted.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Stored components for `id`, if present.
    pub fn get(&self, id: NodeId) -> Option<&[f32]> {
        self.vectors.get(&id).map(Vec::as_slice)
    }

    /// Every stored vector, live or soft-deleted, in id order — used when
    /// persisting the index to a snapshot. The on-disk `Vector` record has
    /// no deleted flag (spec §3), so nothing is dropped here; soft-delete is
    /// an in-memory query-time filter only.
    pub fn all_vectors(&self) -> Vec<(NodeId, &[f32])> {
        self.nodes
            .keys()
            .filter_map(|id| self.vectors.get(id).map(|dims| (*id, dims.as_slice())))
            .collect()
    }

    fn max_connections_layer0(&self) -> usize {
        self.m * 2
    }

    fn max_connections(&self) -> usize {
        self.m
    }

    fn splitmix64(&self, mut x: u64) -> u64 {
        x = x.wrapping_add(0x9e3779b97f4a7c15);
        x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
        x ^ (x >> 31)
    }

    fn assign_level(&mut self) -> usize {
        self.rng_counter += 1;
        let hash = self.splitmix64(self.rng_seed.wrapping_add(self.rng_counter));
        let uniform = ((hash as f64) / (u64::MAX as f64)).max(1e-15);
        (-uniform.ln() * self.ml) as usize
    }

    /// Insert or overwrite a vector (spec §3: last write wins). `dims` must
    /// already be `dimension`-long and unit-normalized; the caller
    /// (`Database`) is responsible for that validation since it owns the
    /// `Vector` record's invariants.
    pub fn insert(&mut self, id: NodeId, dims: Vec<f32>) -> MemoraResult<()> {
        if dims.len() != self.dimension {
            return Err(MemoraError::InvalidInput(format!(
                "vector for {id} has {} dims, expected {}",
                dims.len(),
                self.dimension
            )));
        }
        if self.nodes.contains_key(&id) {
            self.remove_from_graph(id);
        }
        self.vectors.insert(id, dims);
        self.insert_into_graph(id);
        Ok(())
    }

    fn remove_from_graph(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for (layer, neighbors) in node.neighbors.iter().enumerate() {
                for &neighbor_id in neighbors {
                    if let Some(n) = self.nodes.get_mut(&neighbor_id) {
                        if layer < n.neighbors.len() {
                            n.neighbors[layer].remove(&id);
                        }
                    }
                }
            }
            if self.entry_point == Some(id) {
                self.entry_point = self.nodes.keys().next().copied();
                self.max_level = self
                    .nodes
                    .values()
                    .map(|n| n.max_layer)
                    .max()
                    .unwrap_or(0);
            }
        }
    }

    fn insert_into_graph(&mut self, id: NodeId) {
        let level = self.assign_level();
        self.nodes.insert(id, HnswNode::new(level));

        let entry_id = match self.entry_point {
            Some(e) => e,
            None => {
                self.entry_point = Some(id);
                self.max_level = level;
                return;
            }
        };

        let embedding = self.vectors[&id].clone();
        let mut current_entry = entry_id;
        if self.max_level > level {
            current_entry =
                self.greedy_search_to_layer(&embedding, entry_id, self.max_level, level + 1);
        }

        let start_layer = level.min(self.max_level);
        for layer in (0..=start_layer).rev() {
            let candidates =
                self.search_layer(&embedding, current_entry, self.ef_construction, layer);
            let selected: Vec<NodeId> = candidates
                .iter()
                .take(self.m)
                .map(|s| s.id)
                .collect();

            if let Some(new_node) = self.nodes.get_mut(&id) {
                if layer < new_node.neighbors.len() {
                    new_node.neighbors[layer].extend(selected.iter().copied());
                }
            }

            let max_conn = if layer == 0 {
                self.max_connections_layer0()
            } else {
                self.max_connections()
            };

            for &neighbor_id in &selected {
                let needs_prune = if let Some(neighbor_node) = self.nodes.get_mut(&neighbor_id) {
                    if layer < neighbor_node.neighbors.len() {
                        neighbor_node.neighbors[layer].insert(id);
                        neighbor_node.neighbors[layer].len() > max_conn
                    } else {
                        false
                    }
                } else {
                    false
                };
                if needs_prune {
                    self.prune_neighbors(neighbor_id, layer, max_conn);
                }
            }

            if let Some(closest) = candidates.first() {
                current_entry = closest.id;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }
    }

    fn prune_neighbors(&mut self, id: NodeId, layer: usize, max_connections: usize) {
        let embedding = match self.vectors.get(&id) {
            Some(e) => e.clone(),
            None => return,
        };
        let neighbors: Vec<NodeId> = match self.nodes.get(&id) {
            Some(node) if layer < node.neighbors.len() => {
                node.neighbors[layer].iter().copied().collect()
            }
            _ => return,
        };

        let mut scored: Vec<ScoredId> = neighbors
            .iter()
            .filter_map(|&nid| {
                self.vectors
                    .get(&nid)
                    .map(|emb| ScoredId {
                        score: similarity(&embedding, emb),
                        id: nid,
                    })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let keep: BTreeSet<NodeId> = scored.into_iter().take(max_connections).map(|s| s.id).collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            if layer < node.neighbors.len() {
                node.neighbors[layer] = keep;
            }
        }
    }

    fn greedy_search_to_layer(
        &self,
        query: &[f32],
        entry_id: NodeId,
        from_layer: usize,
        to_layer: usize,
    ) -> NodeId {
        let mut current = entry_id;
        for layer in (to_layer..=from_layer).rev() {
            let mut improved = true;
            while improved {
                improved = false;
                let current_embedding = match self.vectors.get(&current) {
                    Some(e) => e,
                    None => break,
                };
                let mut best_score = similarity(query, current_embedding);
                let mut best_id = current;

                if let Some(node) = self.nodes.get(&current) {
                    if layer < node.neighbors.len() {
                        for &neighbor_id in &node.neighbors[layer] {
                            if let Some(neighbor_embedding) = self.vectors.get(&neighbor_id) {
                                let score = similarity(query, neighbor_embedding);
                                if score > best_score
                                    || (score == best_score && neighbor_id < best_id)
                                {
                                    best_score = score;
                                    best_id = neighbor_id;
                                }
                            }
                        }
                    }
                }

                if best_id != current {
                    current = best_id;
                    improved = true;
                }
            }
        }
        current
    }

    /// Beam search at one layer (paper Algorithm 2, SEARCH-LAYER). Returns up
    /// to `ef` closest live nodes, sorted by `(score desc, id asc)`; deleted
    /// nodes are traversed but never returned.
    fn search_layer(&self, query: &[f32], entry_id: NodeId, ef: usize, layer: usize) -> Vec<ScoredId> {
        let entry_embedding = match self.vectors.get(&entry_id) {
            Some(e) => e,
            None => return Vec::new(),
        };
        let entry_score = similarity(query, entry_embedding);

        let mut visited = BTreeSet::new();
        visited.insert(entry_id);

        let mut candidates = BinaryHeap::new();
        candidates.push(ScoredId {
            score: entry_score,
            id: entry_id,
        });

        let mut results: BinaryHeap<Reverse<ScoredId>> = BinaryHeap::new();
        let entry_deleted = self.nodes.get(&entry_id).map(|n| n.deleted).unwrap_or(false);
        if !entry_deleted {
            results.push(Reverse(ScoredId {
                score: entry_score,
                id: entry_id,
            }));
        }

        while let Some(nearest) = candidates.pop() {
            let worst = results.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
            if nearest.score < worst && results.len() >= ef {
                break;
            }

            if let Some(node) = self.nodes.get(&nearest.id) {
                if layer < node.neighbors.len() {
                    let layer_neighbors: Vec<NodeId> = node.neighbors[layer].iter().copied().collect();
                    for neighbor_id in layer_neighbors {
                        if visited.contains(&neighbor_id) {
                            continue;
                        }
                        visited.insert(neighbor_id);

                        if let Some(neighbor_embedding) = self.vectors.get(&neighbor_id) {
                            let score = similarity(query, neighbor_embedding);
                            let worst =
                                results.peek().map(|r| r.0.score).unwrap_or(f32::NEG_INFINITY);
                            if results.len() < ef || score > worst {
                                candidates.push(ScoredId {
                                    score,
                                    id: neighbor_id,
                                });
                                let is_deleted =
                                    self.nodes.get(&neighbor_id).map(|n| n.deleted).unwrap_or(false);
                                if !is_deleted {
                                    results.push(Reverse(ScoredId {
                                        score,
                                        id: neighbor_id,
                                    }));
                                    if results.len() > ef {
                                        results.pop();
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut out: Vec<ScoredId> = results.into_iter().map(|r| r.0).collect();
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    /// Approximate top-`k` nearest neighbors to `query` by similarity,
    /// excluding soft-deleted nodes (spec §4.4 query algorithm).
    pub fn query(&self, query: &[f32], k: usize) -> Vec<(NodeId, f32)> {
        if k == 0 || query.len() != self.dimension {
            return Vec::new();
        }
        let entry_id = match self.entry_point {
            Some(id) => id,
            None => return Vec::new(),
        };
        if self.nodes.values().all(|n| n.deleted) {
            return Vec::new();
        }

        let mut current_entry = entry_id;
        if self.max_level > 0 {
            current_entry = self.greedy_search_to_layer(query, entry_id, self.max_level, 1);
        }

        let ef = self.ef_search.max(k);
        let candidates = self.search_layer(query, current_entry, ef, 0);

        candidates
            .into_iter()
            .filter(|s| self.nodes.get(&s.id).map(|n| !n.deleted).unwrap_or(false))
            .take(k)
            .map(|s| (s.id, s.score))
            .collect()
    }

    /// Soft-delete `id`: excluded from future `query` results, kept as a
    /// graph waypoint. Returns `true` if it was live.
    pub fn soft_delete(&mut self, id: NodeId) -> bool {
        let was_live = self.nodes.get(&id).map(|n| !n.deleted).unwrap_or(false);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.deleted = true;
        }
        if was_live && self.entry_point == Some(id) {
            self.entry_point = self
                .nodes
                .iter()
                .find(|(_, n)| !n.deleted)
                .map(|(id, _)| *id);
            self.max_level = self
                .entry_point
                .and_then(|ep| self.nodes.get(&ep))
                .map(|n| n.max_layer)
                .unwrap_or(0);
        }
        was_live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(dim: usize) -> HnswIndex {
        HnswIndex::new(&HnswConfig::default(), dim)
    }

    #[test]
    fn insert_and_query_finds_closest() {
        let mut idx = index(3);
        idx.insert(NodeId::new(1), vec![1.0, 0.0, 0.0]).unwrap();
        idx.insert(NodeId::new(2), vec![0.0, 1.0, 0.0]).unwrap();
        idx.insert(NodeId::new(3), vec![0.9, 0.1, 0.0]).unwrap();

        let results = idx.query(&[1.0, 0.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, NodeId::new(1));
        assert_eq!(results[1].0, NodeId::new(3));
    }

    #[test]
    fn wrong_dimension_is_invalid_input() {
        let mut idx = index(3);
        let err = idx.insert(NodeId::new(1), vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, MemoraError::InvalidInput(_)));
    }

    #[test]
    fn soft_deleted_vector_excluded_from_results_but_stays_in_graph() {
        let mut idx = index(3);
        idx.insert(NodeId::new(1), vec![1.0, 0.0, 0.0]).unwrap();
        idx.insert(NodeId::new(2), vec![0.0, 1.0, 0.0]).unwrap();
        idx.insert(NodeId::new(3), vec![0.0, 0.0, 1.0]).unwrap();

        assert!(idx.soft_delete(NodeId::new(1)));
        assert!(idx.contains(NodeId::new(1)));
        assert_eq!(idx.len(), 2);

        let results = idx.query(&[1.0, 0.0, 0.0], 10);
        assert!(results.iter().all(|(id, _)| *id != NodeId::new(1)));
    }

    #[test]
    fn identical_insert_sequence_is_deterministic() {
        let build = || {
            let mut idx = index(4);
            for i in 0..20u64 {
                let mut dims = vec![0.0f32; 4];
                dims[(i % 4) as usize] = 1.0;
                idx.insert(NodeId::new(i), dims).unwrap();
            }
            idx.query(&[1.0, 0.0, 0.0, 0.0], 5)
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn overwrite_is_last_write_wins() {
        let mut idx = index(2);
        idx.insert(NodeId::new(1), vec![1.0, 0.0]).unwrap();
        idx.insert(NodeId::new(1), vec![0.0, 1.0]).unwrap();
        assert_eq!(idx.get(NodeId::new(1)), Some([0.0, 1.0].as_slice()));
        assert_eq!(idx.len(), 1);
    }
}
