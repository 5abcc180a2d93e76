//! Query engine (spec §4.5): graph traversal, vector similarity, and their
//! union. No cross-modal re-ranking — `query_hybrid` composes the two result
//! sets as-is.

use std::collections::HashSet;

use memora_core::{EdgeKind, MemoraError, MemoraResult, NodeId};

use crate::graph::GraphIndex;
use crate::vector::HnswIndex;

/// Bounded-depth BFS from `start` over the graph (spec §4.3/§4.5
/// `query_related`).
pub fn query_related(
    graph: &GraphIndex,
    start: NodeId,
    max_depth: usize,
    kind_filter: Option<EdgeKind>,
) -> MemoraResult<Vec<NodeId>> {
    graph.query_related(start, max_depth, kind_filter)
}

/// Top-`k` approximate nearest neighbors to an explicit query vector (spec
/// §4.5 `query_similar_by_vector`).
pub fn query_similar_by_vector(vectors: &HnswIndex, query: &[f32], k: usize) -> Vec<(NodeId, f32)> {
    vectors.query(query, k)
}

/// Top-`k` approximate nearest neighbors to the vector already stored for
/// `id` (spec §4.5 `query_similar`); `id` itself is excluded from the
/// results since it would always be its own nearest neighbor.
pub fn query_similar(vectors: &HnswIndex, id: NodeId, k: usize) -> MemoraResult<Vec<(NodeId, f32)>> {
    let query = vectors
        .get(id)
        .ok_or_else(|| MemoraError::not_found("vector", id))?
        .to_vec();
    Ok(query_similar_by_vector(vectors, &query, k + 1)
        .into_iter()
        .filter(|(found, _)| *found != id)
        .take(k)
        .collect())
}

/// Union of a graph traversal and a vector query starting from the same
/// node: every related id, then every similar id not already present, in
/// each sub-query's own order (spec §4.5 `query_hybrid` — no re-ranking).
pub fn query_hybrid(
    graph: &GraphIndex,
    vectors: &HnswIndex,
    start: NodeId,
    max_depth: usize,
    kind_filter: Option<EdgeKind>,
    k: usize,
) -> MemoraResult<Vec<NodeId>> {
    let related = query_related(graph, start, max_depth, kind_filter)?;
    let similar = query_similar(vectors, start, k).unwrap_or_default();

    let mut seen: HashSet<NodeId> = related.iter().copied().collect();
    let mut out = related;
    for (id, _) in similar {
        if seen.insert(id) {
            out.push(id);
        }
    }
    Ok(out)
}
