//! # Memora
//!
//! A hybrid graph + vector database built for LLM-oriented semantic memory.
//!
//! Memora stores three kinds of data behind one durable, single-writer log:
//! typed nodes and directed edges (the graph), fixed-dimension embeddings
//! (the vector index), and free-form content blobs addressed by node id.
//! On top of that core, the memory layer adds the vocabulary an LLM agent
//! actually wants: memories with a type/confidence/importance, sessions,
//! and a hybrid `query_memories` pipeline that blends vector recall with
//! graph traversal.
//!
//! # Quick Start
//!
//! ```no_run
//! use memora::{Memora, MemoryType, StoreOptions};
//!
//! fn main() -> memora::Result<()> {
//!     let mut db = Memora::open("./my-data")?;
//!
//!     let id = db.store_memory(
//!         MemoryType::Preference,
//!         "prefers concise answers",
//!         StoreOptions::default(),
//!     )?;
//!     let memory = db.get_memory(id).expect("just stored");
//!     assert_eq!(memory.content.as_deref(), Some("prefers concise answers"));
//!
//!     db.create_snapshot()?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The [`Memora`] struct is the only entry point most callers need. It
//! owns a [`memora_memory::MemoryManager`], which in turn owns the
//! [`memora_engine::Database`] that coordinates the append log, snapshot
//! manager, graph index, and HNSW vector index. Lower-level graph/vector
//! operations (`insert_node`, `query_hybrid`, ...) and the higher-level
//! memory operations (`store_memory`, `query_memories`, ...) are both
//! exposed directly on `Memora` — there is no separate handle to juggle.
//!
//! Internal crates (`memora-core`, `memora-durability`, `memora-engine`,
//! `memora-memory`) are implementation detail; this crate re-exports the
//! types callers need to hold.

#![warn(missing_docs)]

use memora_core::MemoraConfig;
use memora_engine::DatabaseStats;
use memora_memory::MemoryManager;
use std::path::PathBuf;

pub use memora_core::{
    ContentBlob, Edge, EdgeKind, HnswConfig, LogConfig, MemoraConfig as Config, MemoraError,
    MemoraResult as Result, Node, NodeId, Vector,
};
pub use memora_engine::DatabaseStats as Stats;
pub use memora_memory::{
    Confidence, EmbeddingProvider, HashEmbeddingProvider, Importance, Memory, MemoryQuery,
    MemoryQueryResult, MemoryStatistics, MemoryType, Session, Source, StoreOptions,
};

/// The main entry point. All operations go through it.
pub struct Memora {
    memory: MemoryManager,
}

impl Memora {
    /// Open (or create) a database at `path` with default configuration.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(MemoraConfig::with_data_path(path))
    }

    /// Open (or create) a database with an explicit configuration (spec
    /// §6: log/snapshot tuning, vector dimension, persistence toggle).
    pub fn open_with_config(config: MemoraConfig) -> Result<Self> {
        Ok(Memora {
            memory: MemoryManager::open(config)?,
        })
    }

    /// Open with a caller-supplied embedding provider in place of the
    /// deterministic hash-based default (spec §4.6: "real deployments
    /// swap in an embedding service behind the same trait").
    pub fn open_with_embedder(
        config: MemoraConfig,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        Ok(Memora {
            memory: MemoryManager::open_with_embedder(config, embedder)?,
        })
    }

    // --- graph / vector primitives (spec §4.7, §6) -------------------

    /// Insert or overwrite a node.
    pub fn insert_node(&mut self, node: Node) -> Result<u64> {
        self.memory.database_mut().insert_node(node)
    }

    /// Insert a directed edge. Rejected before it reaches the log if
    /// either endpoint is unknown or it would duplicate an edge.
    pub fn insert_edge(&mut self, edge: Edge) -> Result<u64> {
        self.memory.database_mut().insert_edge(edge)
    }

    /// Insert or overwrite a vector. Must be unit-normalized and match the
    /// configured vector dimension.
    pub fn insert_vector(&mut self, vector: Vector) -> Result<u64> {
        self.memory.database_mut().insert_vector(vector)
    }

    /// Insert a batch of nodes, then edges, then vectors, in that order.
    pub fn insert_batch(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, vectors: Vec<Vector>) -> Result<()> {
        self.memory.database_mut().insert_batch(nodes, edges, vectors)
    }

    /// Look up a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.memory.database().get_node(id)
    }

    /// Look up a stored vector's components by id.
    pub fn get_vector(&self, id: NodeId) -> Option<&[f32]> {
        self.memory.database().get_vector(id)
    }

    /// Bounded-depth BFS from `start` over the graph, optionally filtered
    /// to a single edge kind.
    pub fn query_related(&self, start: NodeId, max_depth: usize, kind_filter: Option<EdgeKind>) -> Result<Vec<NodeId>> {
        self.memory.database().query_related(start, max_depth, kind_filter)
    }

    /// Top-`k` nearest neighbors to an explicit query vector.
    pub fn query_similar_by_vector(&self, query_vec: &[f32], k: usize) -> Vec<(NodeId, f32)> {
        self.memory.database().query_similar_by_vector(query_vec, k)
    }

    /// Top-`k` nearest neighbors to the vector stored for `id`.
    pub fn query_similar(&self, id: NodeId, k: usize) -> Result<Vec<(NodeId, f32)>> {
        self.memory.database().query_similar(id, k)
    }

    /// Union of `query_related` and `query_similar` from the same start
    /// node (spec §4.5 hybrid query).
    pub fn query_hybrid(
        &self,
        start: NodeId,
        max_depth: usize,
        kind_filter: Option<EdgeKind>,
        k: usize,
    ) -> Result<Vec<NodeId>> {
        self.memory.database().query_hybrid(start, max_depth, kind_filter, k)
    }

    /// Edges leaving `id`, insertion order.
    pub fn outgoing_edges(&self, id: NodeId) -> Vec<Edge> {
        self.memory.database().outgoing_edges(id)
    }

    // --- memory layer (spec §4.6) -------------------------------------

    /// Store a new memory.
    pub fn store_memory(&mut self, memory_type: MemoryType, content: &str, options: StoreOptions) -> Result<NodeId> {
        self.memory.store_memory(memory_type, content, options)
    }

    /// Look up a memory by id. Content is `None` if it was forgotten.
    pub fn get_memory(&self, id: NodeId) -> Option<Memory> {
        self.memory.get_memory(id)
    }

    /// Re-store content and/or metadata for an existing memory.
    pub fn update_memory(
        &mut self,
        id: NodeId,
        content: &str,
        confidence: Option<Confidence>,
        importance: Option<Importance>,
        create_embedding: bool,
    ) -> Result<()> {
        self.memory.update_memory(id, content, confidence, importance, create_embedding)
    }

    /// Forget a memory: clears its content, leaves the node and any edges
    /// in place.
    pub fn forget_memory(&mut self, id: NodeId) -> Result<()> {
        self.memory.forget_memory(id)
    }

    /// Append an edge between two existing memory/concept node ids.
    pub fn create_relationship(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> Result<()> {
        self.memory.create_relationship(from, to, kind)
    }

    /// Create a concept anchor node: a shared relationship target not tied
    /// to any one memory (e.g. a topic or entity).
    pub fn create_concept_anchor(&mut self, label: &str) -> Result<NodeId> {
        self.memory.create_concept_anchor(label)
    }

    /// Create a new session, returning its id.
    pub fn create_session(&mut self, user_id: u64, title: String, context: String) -> u64 {
        self.memory.create_session(user_id, title, context)
    }

    /// Make `session_id` the active session for subsequent `store_memory`
    /// calls that omit an explicit session.
    pub fn set_current_session(&mut self, session_id: u64) -> Result<()> {
        self.memory.set_current_session(session_id)
    }

    /// The currently active session, if any.
    pub fn get_current_session(&self) -> Option<&Session> {
        self.memory.get_current_session()
    }

    /// Run the `query_memories` pipeline: vector recall (when `query_text`
    /// is set) or a full scan, filtered, optionally joined with related
    /// memories over the graph, sorted, and truncated to `limit`.
    pub fn query_memories(&self, query: &MemoryQuery) -> Result<MemoryQueryResult> {
        self.memory.query_memories(query)
    }

    /// Aggregate counters over every memory and session ever created.
    pub fn get_statistics(&self) -> MemoryStatistics {
        self.memory.get_statistics()
    }

    // --- durability / observability (spec §4.2, §4.7) -----------------

    /// Create an immutable snapshot of the current state, including any
    /// memory content appended since the last snapshot.
    pub fn create_snapshot(&mut self) -> Result<()> {
        let pending = self.memory.drain_pending_content();
        self.memory.database_mut().create_snapshot(&pending)?;
        Ok(())
    }

    /// Current point-in-time counters (node/edge/vector counts, log
    /// cursor, last snapshot id).
    pub fn get_stats(&self) -> DatabaseStats {
        self.memory.database().stats()
    }

    /// Whether enough writes have accumulated since the last snapshot to
    /// warrant calling `create_snapshot` again (spec §6
    /// `auto_snapshot_interval`).
    pub fn should_auto_snapshot(&self) -> bool {
        self.memory.database().should_auto_snapshot()
    }
}
