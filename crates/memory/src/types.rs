//! Memory-layer types: the semantic vocabulary layered on top of the graph
//! node / vector record pair (spec §3, §4.6).

use memora_core::{Edge, NodeId, SESSION_CONTEXT_BYTES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What kind of thing a memory represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    /// Something that happened ("user asked about X").
    Experience,
    /// A stated fact ("user's name is Alice").
    Fact,
    /// A standing preference ("prefers concise answers").
    Preference,
    /// Ambient context that doesn't fit the other three.
    Context,
}

impl MemoryType {
    /// Encode to the node label's first metadata byte.
    pub fn to_u8(self) -> u8 {
        match self {
            MemoryType::Experience => 0,
            MemoryType::Fact => 1,
            MemoryType::Preference => 2,
            MemoryType::Context => 3,
        }
    }

    /// Decode from the node label's first metadata byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MemoryType::Experience),
            1 => Some(MemoryType::Fact),
            2 => Some(MemoryType::Preference),
            3 => Some(MemoryType::Context),
            _ => None,
        }
    }
}

/// How sure the source is of this memory's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    /// Lowest confidence tier.
    Low,
    /// Medium confidence tier.
    Medium,
    /// High confidence tier.
    High,
    /// Highest confidence tier.
    Certain,
}

impl Confidence {
    /// Encode to the node label's second metadata byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Confidence::Low => 0,
            Confidence::Medium => 1,
            Confidence::High => 2,
            Confidence::Certain => 3,
        }
    }

    /// Decode from the node label's second metadata byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Confidence::Low),
            1 => Some(Confidence::Medium),
            2 => Some(Confidence::High),
            3 => Some(Confidence::Certain),
            _ => None,
        }
    }
}

/// How much this memory should weigh in downstream decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    /// Lowest importance tier.
    Low,
    /// Medium importance tier.
    Medium,
    /// High importance tier.
    High,
    /// Highest importance tier.
    Critical,
}

impl Importance {
    /// Encode to the node label's third metadata byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Importance::Low => 0,
            Importance::Medium => 1,
            Importance::High => 2,
            Importance::Critical => 3,
        }
    }

    /// Decode from the node label's third metadata byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Importance::Low),
            1 => Some(Importance::Medium),
            2 => Some(Importance::High),
            3 => Some(Importance::Critical),
            _ => None,
        }
    }
}

/// Where a memory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// Stated directly by the user.
    User,
    /// Produced by the system itself.
    System,
    /// Derived by inference from other memories.
    Inferred,
    /// Imported from an external system.
    External,
}

/// Options accepted by `store_memory` (spec §4.6).
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Confidence tier.
    pub confidence: Confidence,
    /// Importance tier.
    pub importance: Importance,
    /// Provenance.
    pub source: Source,
    /// Session this memory belongs to, if any.
    pub session_id: Option<u64>,
    /// User this memory belongs to, if any.
    pub user_id: Option<u64>,
    /// Whether to compute and store an embedding. Default `true`.
    pub create_embedding: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            confidence: Confidence::Medium,
            importance: Importance::Medium,
            source: Source::User,
            session_id: None,
            user_id: None,
            create_embedding: true,
        }
    }
}

/// A stored semantic memory: a graph node, its full content, and (usually)
/// an embedding, decorated with the metadata spec §4.6 exposes to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    /// Node id this memory lives at.
    pub id: NodeId,
    /// What kind of memory this is.
    pub memory_type: MemoryType,
    /// Confidence tier.
    pub confidence: Confidence,
    /// Importance tier.
    pub importance: Importance,
    /// Full content. `None` only when the content was forgotten and is
    /// unrecoverable — never filled with a placeholder (spec §4.6 Forget).
    pub content: Option<String>,
    /// Session this memory was stored under, if any.
    pub session_id: Option<u64>,
    /// User this memory belongs to, if any.
    pub user_id: Option<u64>,
    /// Stored embedding, if one was computed.
    pub embedding: Option<Vec<f32>>,
}

/// A conversation/context grouping of memories (spec §3 Data Model).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub session_id: u64,
    /// Owning user.
    pub user_id: u64,
    /// Human-readable title.
    pub title: String,
    /// Free-form context, truncated to `SESSION_CONTEXT_BYTES`.
    pub context: String,
    /// Creation timestamp (microseconds since epoch).
    pub created_at: u64,
    /// Last time a memory carrying this session id was inserted.
    pub last_active: u64,
    /// Number of memories stored under this session.
    pub interaction_count: u64,
    /// Whether this session is still accepting new memories.
    pub is_active: bool,
}

impl Session {
    /// Build a new session, truncating `context` to `SESSION_CONTEXT_BYTES`
    /// at a UTF-8 boundary.
    pub fn new(session_id: u64, user_id: u64, title: String, context: String, created_at: u64) -> Self {
        let context = truncate_utf8(&context, SESSION_CONTEXT_BYTES);
        Session {
            session_id,
            user_id,
            title,
            context,
            created_at,
            last_active: created_at,
            interaction_count: 0,
            is_active: true,
        }
    }
}

pub(crate) fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// A query over stored memories (spec §4.6 `query_memories`).
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    /// Free-text query; when present the pipeline seeds results from a
    /// vector top-k search instead of a full scan.
    pub query_text: Option<String>,
    /// Restrict to these memory types.
    pub memory_types: Option<Vec<MemoryType>>,
    /// Minimum confidence tier (inclusive).
    pub min_confidence: Option<Confidence>,
    /// Minimum importance tier (inclusive).
    pub min_importance: Option<Importance>,
    /// Restrict to this session.
    pub session_id: Option<u64>,
    /// Restrict to this user.
    pub user_id: Option<u64>,
    /// Whether to attach BFS-related memories per surviving result.
    pub include_related: bool,
    /// BFS depth bound used when `include_related` is set.
    pub max_depth: usize,
    /// Maximum number of memories to return.
    pub limit: usize,
}

/// Result of `query_memories` (spec §4.6 pipeline step 6).
#[derive(Debug, Clone, Default)]
pub struct MemoryQueryResult {
    /// Matching memories, in final sorted/truncated order.
    pub memories: Vec<Memory>,
    /// Similarity score per entry in `memories`, parallel array; empty when
    /// the query had no `query_text`.
    pub similarity_scores: Vec<f32>,
    /// Related memory ids per surviving memory id, present only when
    /// `include_related` was set.
    pub related_memories: HashMap<NodeId, Vec<NodeId>>,
    /// Outgoing edges collected from surviving memories when
    /// `include_related` was set.
    pub relationships: Vec<Edge>,
    /// Wall-clock time the query took, in milliseconds.
    pub execution_time_ms: u64,
}

/// Aggregate counters returned by `get_statistics` (spec §4.6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStatistics {
    /// Total number of memories ever stored (including forgotten ones,
    /// whose nodes remain per §3 Lifecycle).
    pub total_memories: u64,
    /// Count broken down by `MemoryType`.
    pub by_type: HashMap<MemoryType, u64>,
    /// Total number of sessions ever created.
    pub total_sessions: u64,
    /// Number of sessions with `is_active == true`.
    pub active_sessions: u64,
}
