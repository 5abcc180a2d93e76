//! In-memory graph index (spec §4.3): a node map plus outgoing/incoming
//! adjacency lists, queried with a bounded-depth breadth-first traversal.

use rustc_hash::FxHashMap;

use memora_core::{Edge, EdgeKind, MemoraError, MemoraResult, Node, NodeId};

/// In-memory graph: nodes keyed by id, edges indexed both directions so
/// `query_related` can walk a node's neighborhood without a full scan.
#[derive(Debug, Default)]
pub struct GraphIndex {
    nodes: FxHashMap<NodeId, Node>,
    outgoing: FxHashMap<NodeId, Vec<Edge>>,
    incoming: FxHashMap<NodeId, Vec<Edge>>,
}

impl GraphIndex {
    /// Empty graph.
    pub fn new() -> Self {
        GraphIndex::default()
    }

    /// Insert or overwrite a node. Last write wins (spec §3 invariant).
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    /// Check that `edge` could legally be inserted, without mutating
    /// anything. Callers that must log before they apply (the log is the
    /// durable record; the index is derived from it) use this to reject a
    /// bad edge before it is ever written to the log.
    pub fn validate_edge(&self, edge: &Edge) -> MemoraResult<()> {
        if edge.from == edge.to {
            return Err(MemoraError::InvalidInput(format!(
                "self-loop rejected: {} -> {}",
                edge.from, edge.to
            )));
        }
        if !self.nodes.contains_key(&edge.from) {
            return Err(MemoraError::not_found("node", edge.from));
        }
        if !self.nodes.contains_key(&edge.to) {
            return Err(MemoraError::not_found("node", edge.to));
        }
        Ok(())
    }

    /// Insert a directed edge. `from`/`to` must already exist and must
    /// differ (no self-loops, spec §3 invariant).
    pub fn insert_edge(&mut self, edge: Edge) -> MemoraResult<()> {
        self.validate_edge(&edge)?;
        self.outgoing.entry(edge.from).or_default().push(edge);
        self.incoming.entry(edge.to).or_default().push(edge);
        Ok(())
    }

    /// Look up a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// True if a node with this id has been inserted.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Edges leaving `id`, insertion order.
    pub fn outgoing_edges(&self, id: NodeId) -> &[Edge] {
        self.outgoing.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges arriving at `id`, insertion order.
    pub fn incoming_edges(&self, id: NodeId) -> &[Edge] {
        self.incoming.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of nodes currently in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges currently in the graph.
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    /// Every node currently in the graph, in arbitrary (hash-map) order —
    /// used when persisting the index to a snapshot.
    pub fn all_nodes(&self) -> Vec<Node> {
        self.nodes.values().copied().collect()
    }

    /// Every edge currently in the graph, in arbitrary (hash-map) order —
    /// used when persisting the index to a snapshot.
    pub fn all_edges(&self) -> Vec<Edge> {
        self.outgoing.values().flatten().copied().collect()
    }

    /// Breadth-first traversal from `start`, following *outgoing* edges up
    /// to `max_depth` hops, optionally restricted to one `EdgeKind`. Depth 0
    /// returns the seed only; depth ≥ 1 returns the seed plus the reachable
    /// set, in BFS discovery order with `start` first (spec §4.3 BFS
    /// semantics).
    pub fn query_related(
        &self,
        start: NodeId,
        max_depth: usize,
        kind_filter: Option<EdgeKind>,
    ) -> MemoraResult<Vec<NodeId>> {
        if !self.nodes.contains_key(&start) {
            return Err(MemoraError::not_found("node", start));
        }

        let mut visited = FxHashMap::default();
        visited.insert(start, 0usize);
        let mut order = vec![start];

        if max_depth == 0 {
            return Ok(order);
        }

        let mut frontier = vec![start];
        for depth in 1..=max_depth {
            let mut next_frontier = Vec::new();
            for &id in &frontier {
                let neighbors = self
                    .outgoing_edges(id)
                    .iter()
                    .filter(|e| kind_filter.map_or(true, |k| e.kind == k))
                    .map(|e| e.to);

                for neighbor in neighbors {
                    if visited.contains_key(&neighbor) {
                        continue;
                    }
                    visited.insert(neighbor, depth);
                    order.push(neighbor);
                    next_frontier.push(neighbor);
                }
            }
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64) -> Node {
        Node::with_text_label(NodeId::new(id), &id.to_string())
    }

    #[test]
    fn insert_edge_requires_both_endpoints() {
        let mut g = GraphIndex::new();
        g.insert_node(node(1));
        let err = g
            .insert_edge(Edge {
                from: NodeId::new(1),
                to: NodeId::new(2),
                kind: EdgeKind::Links,
            })
            .unwrap_err();
        assert!(matches!(err, MemoraError::NotFound { .. }));
    }

    #[test]
    fn self_loop_rejected() {
        let mut g = GraphIndex::new();
        g.insert_node(node(1));
        let err = g
            .insert_edge(Edge {
                from: NodeId::new(1),
                to: NodeId::new(1),
                kind: EdgeKind::Links,
            })
            .unwrap_err();
        assert!(matches!(err, MemoraError::InvalidInput(_)));
    }

    #[test]
    fn bfs_respects_depth_bound() {
        let mut g = GraphIndex::new();
        for i in 1..=4 {
            g.insert_node(node(i));
        }
        // chain 1 -> 2 -> 3 -> 4
        for (a, b) in [(1, 2), (2, 3), (3, 4)] {
            g.insert_edge(Edge {
                from: NodeId::new(a),
                to: NodeId::new(b),
                kind: EdgeKind::Links,
            })
            .unwrap();
        }

        let one_hop = g.query_related(NodeId::new(1), 1, None).unwrap();
        assert_eq!(one_hop, vec![NodeId::new(1), NodeId::new(2)]);

        let two_hop = g.query_related(NodeId::new(1), 2, None).unwrap();
        assert_eq!(two_hop, vec![NodeId::new(1), NodeId::new(2), NodeId::new(3)]);

        let deep = g.query_related(NodeId::new(1), 10, None).unwrap();
        assert_eq!(
            deep,
            vec![NodeId::new(1), NodeId::new(2), NodeId::new(3), NodeId::new(4)]
        );
    }

    #[test]
    fn zero_depth_returns_only_the_seed() {
        let mut g = GraphIndex::new();
        g.insert_node(node(1));
        g.insert_node(node(2));
        g.insert_edge(Edge {
            from: NodeId::new(1),
            to: NodeId::new(2),
            kind: EdgeKind::Links,
        })
        .unwrap();
        assert_eq!(
            g.query_related(NodeId::new(1), 0, None).unwrap(),
            vec![NodeId::new(1)]
        );
    }

    #[test]
    fn only_outgoing_edges_are_followed() {
        let mut g = GraphIndex::new();
        g.insert_node(node(1));
        g.insert_node(node(2));
        g.insert_edge(Edge {
            from: NodeId::new(1),
            to: NodeId::new(2),
            kind: EdgeKind::Links,
        })
        .unwrap();
        // node 2 has only an incoming edge, so BFS from it finds nothing else.
        assert_eq!(
            g.query_related(NodeId::new(2), 1, None).unwrap(),
            vec![NodeId::new(2)]
        );
    }

    #[test]
    fn bfs_filters_by_edge_kind() {
        let mut g = GraphIndex::new();
        for i in 1..=3 {
            g.insert_node(node(i));
        }
        g.insert_edge(Edge {
            from: NodeId::new(1),
            to: NodeId::new(2),
            kind: EdgeKind::Links,
        })
        .unwrap();
        g.insert_edge(Edge {
            from: NodeId::new(1),
            to: NodeId::new(3),
            kind: EdgeKind::Owns,
        })
        .unwrap();

        let related = g
            .query_related(NodeId::new(1), 1, Some(EdgeKind::Owns))
            .unwrap();
        assert_eq!(related, vec![NodeId::new(1), NodeId::new(3)]);
    }

    #[test]
    fn unknown_start_node_is_not_found() {
        let g = GraphIndex::new();
        let err = g.query_related(NodeId::new(99), 1, None).unwrap_err();
        assert!(matches!(err, MemoraError::NotFound { .. }));
    }
}
