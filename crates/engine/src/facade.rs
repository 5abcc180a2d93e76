//! `Database`: the facade that wires the append log and snapshot manager
//! (`memora-durability`) to the graph and vector indices (spec §4.7).

use std::path::PathBuf;
use std::time::Instant;

use memora_core::{
    ContentBlob, Edge, EdgeKind, MemoraConfig, MemoraError, MemoraResult, Node, NodeId,
    RecordKind, Vector,
};
use memora_durability::{AppendLog, LogIterator, SnapshotManager, SnapshotManifest};

use crate::graph::GraphIndex;
use crate::query;
use crate::recovery::restore_latest;
use crate::vector::HnswIndex;

/// Point-in-time counters returned by `get_stats` (spec §4.7, §3 supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Live node count.
    pub node_count: usize,
    /// Live edge count.
    pub edge_count: usize,
    /// Stored vector count (including soft-deleted, spec §4.4 supplement).
    pub vector_count: usize,
    /// Next sequence number the log will assign.
    pub log_next_seq: u64,
    /// Most recent snapshot id, if any snapshot has ever been created.
    pub last_snapshot_id: Option<u64>,
}

/// Coordinates the append log, the snapshot manager, and the in-memory
/// graph/vector indices behind one write path (spec §4.7, §5).
pub struct Database {
    config: MemoraConfig,
    log: AppendLog,
    snapshots: SnapshotManager,
    graph: GraphIndex,
    vectors: HnswIndex,
    next_snapshot_id: u64,
    last_snapshot_id: Option<u64>,
    writes_since_snapshot: u64,
    last_append_latency_ms: u64,
}

impl Database {
    /// Open (or create) a database at `config.data_path`, replaying the
    /// append log on top of whatever snapshot loads cleanly (spec §4.6
    /// Recovery, §9 restore-orchestration resolution).
    pub fn open(config: MemoraConfig) -> MemoraResult<Self> {
        std::fs::create_dir_all(&config.data_path)
            .map_err(|e| MemoraError::io(&config.data_path, e))?;

        let log_path: PathBuf = config.data_path.join("memora.log");
        let log = AppendLog::open(&log_path, config.log.fsync_window_ms)?;
        let snapshots = SnapshotManager::new(&config.data_path);

        let mut graph = GraphIndex::new();
        let mut vectors = HnswIndex::new(&config.hnsw, config.vector_dimension);

        let (replay_after, next_snapshot_id, last_snapshot_id) = if config.enable_persistent_indexes
        {
            match restore_latest(&snapshots)? {
                Some(restored) => {
                    tracing::info!(
                        snapshot_id = restored.manifest.snapshot_id,
                        nodes = restored.nodes.len(),
                        edges = restored.edges.len(),
                        vectors = restored.vectors.len(),
                        "restored from snapshot"
                    );
                    for node in restored.nodes {
                        graph.insert_node(node);
                    }
                    for vector in restored.vectors {
                        vectors.insert(vector.id, vector.dims)?;
                    }
                    for edge in restored.edges {
                        graph.insert_edge(edge)?;
                    }
                    (
                        Some(restored.manifest.log_cursor),
                        restored.manifest.snapshot_id + 1,
                        Some(restored.manifest.snapshot_id),
                    )
                }
                None => (None, 1, None),
            }
        } else {
            (None, 1, None)
        };

        for frame in LogIterator::after(&log_path, replay_after)? {
            apply_frame(&mut graph, &mut vectors, &frame.kind, &frame.payload)?;
        }

        Ok(Database {
            config,
            log,
            snapshots,
            graph,
            vectors,
            next_snapshot_id,
            last_snapshot_id,
            writes_since_snapshot: 0,
            last_append_latency_ms: 0,
        })
    }

    fn check_backpressure(&self) -> MemoraResult<()> {
        if self.last_append_latency_ms > self.config.log.backpressure_high_watermark_ms {
            return Err(MemoraError::Backpressure {
                observed_ms: self.last_append_latency_ms,
                limit_ms: self.config.log.backpressure_high_watermark_ms,
            });
        }
        Ok(())
    }

    fn append(&mut self, kind: RecordKind, payload: &[u8]) -> MemoraResult<u64> {
        self.check_backpressure()?;
        let start = Instant::now();
        let seq = self.log.append(kind, payload)?;
        self.last_append_latency_ms = start.elapsed().as_millis() as u64;
        self.writes_since_snapshot += 1;
        Ok(seq)
    }

    /// Insert or overwrite a node (spec §3: last write wins).
    pub fn insert_node(&mut self, node: Node) -> MemoraResult<u64> {
        let seq = self.append(RecordKind::Node, &node.to_bytes())?;
        self.graph.insert_node(node);
        Ok(seq)
    }

    /// Insert a directed edge. Validated against the current graph before
    /// being written to the log, so an invalid edge never lands in the log.
    pub fn insert_edge(&mut self, edge: Edge) -> MemoraResult<u64> {
        self.graph.validate_edge(&edge)?;
        let seq = self.append(RecordKind::Edge, &edge.to_bytes())?;
        self.graph
            .insert_edge(edge)
            .expect("edge was already validated above");
        Ok(seq)
    }

    /// Insert or overwrite a vector. Must be `config.vector_dimension`-long
    /// and unit-normalized (spec §3 invariant).
    pub fn insert_vector(&mut self, vector: Vector) -> MemoraResult<u64> {
        if vector.dims.len() != self.config.vector_dimension {
            return Err(MemoraError::InvalidInput(format!(
                "vector for {} has {} dims, expected {}",
                vector.id,
                vector.dims.len(),
                self.config.vector_dimension
            )));
        }
        if !vector.is_normalized() {
            return Err(MemoraError::InvalidInput(format!(
                "vector for {} is not unit-normalized",
                vector.id
            )));
        }
        let seq = self.append(RecordKind::Vector, &vector.to_bytes())?;
        self.vectors.insert(vector.id, vector.dims)?;
        Ok(seq)
    }

    /// Insert a batch of nodes, then edges, then vectors, in that order
    /// (spec §4.7: edges/vectors may reference ids minted by an earlier
    /// record in the same batch).
    pub fn insert_batch(
        &mut self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        vectors: Vec<Vector>,
    ) -> MemoraResult<()> {
        for node in nodes {
            self.insert_node(node)?;
        }
        for edge in edges {
            self.insert_edge(edge)?;
        }
        for vector in vectors {
            self.insert_vector(vector)?;
        }
        Ok(())
    }

    /// Look up a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.graph.get_node(id)
    }

    /// Look up a stored vector's components by id.
    pub fn get_vector(&self, id: NodeId) -> Option<&[f32]> {
        self.vectors.get(id)
    }

    /// Bounded-depth BFS from `start` (spec §4.3/§4.5).
    pub fn query_related(
        &self,
        start: NodeId,
        max_depth: usize,
        kind_filter: Option<EdgeKind>,
    ) -> MemoraResult<Vec<NodeId>> {
        query::query_related(&self.graph, start, max_depth, kind_filter)
    }

    /// Top-`k` nearest neighbors to an explicit query vector (spec §4.5).
    pub fn query_similar_by_vector(&self, query_vec: &[f32], k: usize) -> Vec<(NodeId, f32)> {
        query::query_similar_by_vector(&self.vectors, query_vec, k)
    }

    /// Top-`k` nearest neighbors to the vector stored for `id` (spec §4.5).
    pub fn query_similar(&self, id: NodeId, k: usize) -> MemoraResult<Vec<(NodeId, f32)>> {
        query::query_similar(&self.vectors, id, k)
    }

    /// Edges leaving `id`, insertion order. Empty if `id` is unknown.
    pub fn outgoing_edges(&self, id: NodeId) -> Vec<Edge> {
        self.graph.outgoing_edges(id).to_vec()
    }

    /// Union of `query_related` and `query_similar` from the same start node
    /// (spec §4.5 `query_hybrid`).
    pub fn query_hybrid(
        &self,
        start: NodeId,
        max_depth: usize,
        kind_filter: Option<EdgeKind>,
        k: usize,
    ) -> MemoraResult<Vec<NodeId>> {
        query::query_hybrid(&self.graph, &self.vectors, start, max_depth, kind_filter, k)
    }

    /// Append a content blob to the log. Content lives only in the log and
    /// in snapshot sidecar files (spec §3); it never enters the graph or
    /// vector indices, so this bypasses `apply_frame`'s index mutation path.
    pub fn append_content(&mut self, blob: &ContentBlob) -> MemoraResult<u64> {
        let payload = serde_json::to_vec(blob)
            .map_err(|e| MemoraError::InvalidInput(format!("cannot encode content blob: {e}")))?;
        self.append(RecordKind::MemoryContent, &payload)
    }

    /// Decode every `MemoryContent` entry in the log with `seq > after`
    /// (spec §4.6 Recovery step 4).
    pub fn replay_content_after(&self, after: Option<u64>) -> MemoraResult<Vec<ContentBlob>> {
        let mut out = Vec::new();
        for frame in LogIterator::after(self.log.path(), after)? {
            if frame.kind == RecordKind::MemoryContent {
                let blob: ContentBlob = serde_json::from_slice(&frame.payload).map_err(|e| {
                    MemoraError::Corruption(format!("bad memory_content frame: {e}"))
                })?;
                out.push(blob);
            }
        }
        Ok(out)
    }

    /// Snapshot manager handle, for the memory layer's own recovery pass
    /// over snapshot manifests (spec §4.6 Recovery steps 1-3).
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// Every node id currently in the graph. Forgetting a memory is
    /// logical-only and never removes its node (spec §3 Lifecycle), so this
    /// is what `next_memory_id` recovery scans for the observed maximum.
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        self.graph.all_nodes().into_iter().map(|n| n.id).collect()
    }

    /// Soft-delete a vector from the index (query-time filter only; the
    /// underlying node/content are untouched — see `memora-memory`'s
    /// `forget_memory`, which is the only intended caller).
    pub fn soft_delete_vector(&mut self, id: NodeId) -> bool {
        self.vectors.soft_delete(id)
    }

    /// Create an immutable snapshot of the current state, quiescing writes
    /// only for the duration of the in-process call (no background writer
    /// thread exists to race with, per spec §5's single-writer model).
    /// `pending_content` is the set of content blobs not yet covered by an
    /// earlier snapshot's sidecar files; the caller (`memora-memory`'s
    /// content cache) tracks that bookkeeping.
    pub fn create_snapshot(&mut self, pending_content: &[ContentBlob]) -> MemoraResult<SnapshotManifest> {
        self.log.fsync()?;

        let nodes = self.graph.all_nodes();
        let edges = self.graph.all_edges();
        let vectors: Vec<Vector> = self
            .vectors
            .all_vectors()
            .into_iter()
            .map(|(id, dims)| Vector {
                id,
                dims: dims.to_vec(),
            })
            .collect();

        let snapshot_id = self.next_snapshot_id;
        let created_at = now_micros();
        let manifest = self.snapshots.create_snapshot(
            snapshot_id,
            created_at,
            self.log.next_seq().saturating_sub(1),
            &nodes,
            &edges,
            &vectors,
            pending_content,
            8 * 1024 * 1024,
        )?;

        tracing::info!(snapshot_id, "created snapshot");
        self.next_snapshot_id += 1;
        self.last_snapshot_id = Some(snapshot_id);
        self.writes_since_snapshot = 0;
        Ok(manifest)
    }

    /// Whether `auto_snapshot_interval` writes have accumulated since the
    /// last snapshot (0 disables automatic snapshotting, spec §6).
    pub fn should_auto_snapshot(&self) -> bool {
        self.config.auto_snapshot_interval != 0
            && self.writes_since_snapshot >= self.config.auto_snapshot_interval
    }

    /// Current point-in-time counters.
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            vector_count: self.vectors.all_vectors().len(),
            log_next_seq: self.log.next_seq(),
            last_snapshot_id: self.last_snapshot_id,
        }
    }
}

fn apply_frame(
    graph: &mut GraphIndex,
    vectors: &mut HnswIndex,
    kind: &RecordKind,
    payload: &[u8],
) -> MemoraResult<()> {
    match kind {
        RecordKind::Node => {
            let node = Node::from_bytes(payload)
                .ok_or_else(|| MemoraError::Corruption("bad node frame payload".into()))?;
            graph.insert_node(node);
        }
        RecordKind::Edge => {
            let edge = Edge::from_bytes(payload)
                .ok_or_else(|| MemoraError::Corruption("bad edge frame payload".into()))?;
            graph.insert_edge(edge)?;
        }
        RecordKind::Vector => {
            let vector = Vector::from_bytes(payload)
                .ok_or_else(|| MemoraError::Corruption("bad vector frame payload".into()))?;
            vectors.insert(vector.id, vector.dims)?;
        }
        RecordKind::MemoryContent => {
            // Content blobs are replayed by the memory layer's own recovery
            // path (spec §4.6), not into the graph/vector indices here.
        }
    }
    Ok(())
}

fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memora_core::VECTOR_DIMENSION;
    use tempfile::tempdir;

    fn unit_vector(id: u64, axis: usize) -> Vector {
        let mut dims = vec![0.0f32; VECTOR_DIMENSION];
        dims[axis] = 1.0;
        Vector {
            id: NodeId::new(id),
            dims,
        }
    }

    #[test]
    fn insert_and_reopen_preserves_state() {
        let dir = tempdir().unwrap();
        let config = MemoraConfig::with_data_path(dir.path());

        {
            let mut db = Database::open(config.clone()).unwrap();
            db.insert_node(Node::with_text_label(NodeId::new(1), "a"))
                .unwrap();
            db.insert_node(Node::with_text_label(NodeId::new(2), "b"))
                .unwrap();
            db.insert_edge(Edge {
                from: NodeId::new(1),
                to: NodeId::new(2),
                kind: EdgeKind::Links,
            })
            .unwrap();
            db.insert_vector(unit_vector(1, 0)).unwrap();
        }

        let db = Database::open(config).unwrap();
        assert!(db.get_node(NodeId::new(1)).is_some());
        assert_eq!(
            db.query_related(NodeId::new(1), 1, None).unwrap(),
            vec![NodeId::new(1), NodeId::new(2)]
        );
        assert!(db.get_vector(NodeId::new(1)).is_some());
    }

    #[test]
    fn snapshot_then_restart_restores_without_log_replay() {
        let dir = tempdir().unwrap();
        let config = MemoraConfig::with_data_path(dir.path());

        {
            let mut db = Database::open(config.clone()).unwrap();
            db.insert_node(Node::with_text_label(NodeId::new(1), "a"))
                .unwrap();
            db.insert_vector(unit_vector(1, 0)).unwrap();
            db.create_snapshot(&[]).unwrap();
        }

        let db = Database::open(config).unwrap();
        let stats = db.stats();
        assert_eq!(stats.node_count, 1);
        assert_eq!(stats.last_snapshot_id, Some(1));
    }

    #[test]
    fn rejects_non_normalized_vector() {
        let dir = tempdir().unwrap();
        let config = MemoraConfig::with_data_path(dir.path());
        let mut db = Database::open(config).unwrap();
        let mut dims = vec![0.0f32; VECTOR_DIMENSION];
        dims[0] = 2.0;
        let err = db
            .insert_vector(Vector {
                id: NodeId::new(1),
                dims,
            })
            .unwrap_err();
        assert!(matches!(err, MemoraError::InvalidInput(_)));
    }

    #[test]
    fn invalid_edge_never_reaches_the_log() {
        let dir = tempdir().unwrap();
        let config = MemoraConfig::with_data_path(dir.path());
        let mut db = Database::open(config).unwrap();
        let before = db.stats().log_next_seq;
        let err = db
            .insert_edge(Edge {
                from: NodeId::new(1),
                to: NodeId::new(2),
                kind: EdgeKind::Links,
            })
            .unwrap_err();
        assert!(matches!(err, MemoraError::NotFound { .. }));
        assert_eq!(db.stats().log_next_seq, before);
    }
}
