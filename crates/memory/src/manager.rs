//! Semantic memory manager: layers `Memory`/`Session` semantics over the
//! `memora-engine::Database` facade (spec §4.6).
//!
//! Association of a memory with a session/user, and sessions themselves,
//! have no dedicated on-disk record kind (spec §6 lists only node, edge,
//! vector, memory_content). They are kept as the manager's own in-memory
//! state, matching §9's "global mutable state is confined to ... the memory
//! manager" and reset to defaults on restart, same as `next_session_id` and
//! `current_session_id`.

use std::collections::HashSet;
use std::time::Instant;

use rustc_hash::FxHashMap;

use memora_core::{
    ContentBlob, Edge, EdgeKind, MemoraConfig, MemoraError, MemoraResult, Node, NodeId, Vector,
    CONCEPT_BIT, LABEL_BYTES,
};
use memora_engine::Database;

use crate::embedding::{EmbeddingProvider, HashEmbeddingProvider};
use crate::types::{
    truncate_utf8, Confidence, Importance, Memory, MemoryQuery, MemoryQueryResult,
    MemoryStatistics, MemoryType, Session, Source, StoreOptions,
};

struct MemoryAssoc {
    session_id: Option<u64>,
    user_id: Option<u64>,
}

/// Coordinates the storage core with the semantic memory vocabulary:
/// storing/retrieving/forgetting memories, sessions, relationships, and the
/// `query_memories` pipeline.
pub struct MemoryManager {
    db: Database,
    embedder: Box<dyn EmbeddingProvider>,
    content_cache: FxHashMap<NodeId, String>,
    memory_ids: HashSet<NodeId>,
    assoc: FxHashMap<NodeId, MemoryAssoc>,
    sessions: FxHashMap<u64, Session>,
    next_memory_id: u64,
    next_concept_id: u64,
    next_session_id: u64,
    current_session_id: Option<u64>,
    pending_content: Vec<ContentBlob>,
}

impl MemoryManager {
    /// Open (or create) the database at `config.data_path` and recover
    /// memory-layer state on top of it (spec §4.6 Recovery).
    pub fn open(config: MemoraConfig) -> MemoraResult<Self> {
        Self::open_with_embedder(config, Box::new(HashEmbeddingProvider))
    }

    /// Same as `open`, with a caller-supplied embedding provider (spec §4.6
    /// "Real deployments swap this for an external embedding service").
    pub fn open_with_embedder(
        config: MemoraConfig,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> MemoraResult<Self> {
        let mut db = Database::open(config)?;

        let mut content_cache: FxHashMap<NodeId, String> = FxHashMap::default();
        let mut forgotten: HashSet<NodeId> = HashSet::new();
        let mut max_cursor: Option<u64> = None;

        for snapshot_id in db.snapshots().list_snapshots()? {
            if let Ok(manifest) = db.snapshots().load_snapshot(snapshot_id) {
                for blob in db.snapshots().load_memory_contents(&manifest)? {
                    apply_content_blob(&mut content_cache, &mut forgotten, blob);
                }
                max_cursor = Some(max_cursor.map_or(manifest.log_cursor, |c| c.max(manifest.log_cursor)));
            }
        }

        // Ids touched by either source below aren't yet covered by any
        // manifest's sidecars — everything in `content_cache`/`forgotten`
        // reached from a loaded manifest above is already durable, but an
        // orphan file or a log-tail entry lives nowhere else on disk until
        // the next `create_snapshot` call writes it out again (spec §4.2
        // Restore step 4, §4.6 Recovery step 4).
        let mut not_yet_snapshotted: HashSet<NodeId> = HashSet::new();

        for blob in db.snapshots().scan_orphan_contents()? {
            if !content_cache.contains_key(&blob.memory_id) && !forgotten.contains(&blob.memory_id) {
                not_yet_snapshotted.insert(blob.memory_id);
                apply_content_blob(&mut content_cache, &mut forgotten, blob);
            }
        }

        for blob in db.replay_content_after(max_cursor)? {
            not_yet_snapshotted.insert(blob.memory_id);
            apply_content_blob(&mut content_cache, &mut forgotten, blob);
        }

        let pending_content: Vec<ContentBlob> = not_yet_snapshotted
            .into_iter()
            .map(|id| ContentBlob {
                memory_id: id,
                content: content_cache.get(&id).cloned().unwrap_or_default(),
            })
            .collect();

        let mut memory_ids: HashSet<NodeId> = content_cache.keys().copied().collect();
        memory_ids.extend(forgotten.iter().copied());

        // A content blob may reference a memory id whose node fell outside
        // the snapshot the engine actually restored from; recreate it with
        // default metadata so reads never fail outright (spec §4.6 step 2).
        let missing_nodes: Vec<NodeId> = memory_ids
            .iter()
            .copied()
            .filter(|id| db.get_node(*id).is_none())
            .collect();
        for id in missing_nodes {
            let node = Node::with_memory_label(
                id,
                MemoryType::Experience.to_u8(),
                Confidence::Medium.to_u8(),
                Importance::Medium.to_u8(),
                "",
            );
            db.insert_node(node)?;
        }

        for id in &forgotten {
            db.soft_delete_vector(*id);
        }

        let observed_max = memory_ids
            .iter()
            .map(|id| id.raw())
            .chain(db.all_node_ids().iter().filter(|id| id.is_user()).map(|id| id.raw()))
            .max();
        let next_memory_id = observed_max.map(|m| m + 1).unwrap_or(1);

        // Concept anchors are persisted nodes too (`create_concept_anchor` ->
        // `insert_node`) and survive a restart; mint past the highest
        // restored counter or a fresh anchor collides with (and
        // last-write-wins overwrites) an existing one.
        let observed_max_concept = db
            .all_node_ids()
            .iter()
            .filter(|id| id.is_concept())
            .map(|id| id.raw() & !CONCEPT_BIT)
            .max();
        let next_concept_id = observed_max_concept.map(|m| m + 1).unwrap_or(1);

        Ok(MemoryManager {
            db,
            embedder,
            content_cache,
            memory_ids,
            assoc: FxHashMap::default(),
            sessions: FxHashMap::default(),
            next_memory_id,
            next_concept_id,
            next_session_id: 1,
            current_session_id: None,
            pending_content,
        })
    }

    /// Store a new memory (spec §4.6 Store algorithm).
    pub fn store_memory(
        &mut self,
        memory_type: MemoryType,
        content: &str,
        options: StoreOptions,
    ) -> MemoraResult<NodeId> {
        if content.is_empty() {
            return Err(MemoraError::InvalidInput("memory content must not be empty".into()));
        }

        let id = NodeId::new(self.next_memory_id);
        self.next_memory_id += 1;

        let blob = ContentBlob {
            memory_id: id,
            content: content.to_string(),
        };
        self.db.append_content(&blob)?;
        self.pending_content.push(blob);
        self.content_cache.insert(id, content.to_string());
        self.memory_ids.insert(id);

        let label = truncate_utf8(content, LABEL_BYTES - 3);
        let node = Node::with_memory_label(
            id,
            memory_type.to_u8(),
            options.confidence.to_u8(),
            options.importance.to_u8(),
            &label,
        );
        self.db.insert_node(node)?;

        if options.create_embedding {
            self.embed_and_store(id, content)?;
        }

        self.assoc.insert(
            id,
            MemoryAssoc {
                session_id: options.session_id,
                user_id: options.user_id,
            },
        );

        if let Some(session_id) = options.session_id {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                session.last_active = now_micros();
                session.interaction_count += 1;
            }
        }

        Ok(id)
    }

    fn embed_and_store(&mut self, id: NodeId, content: &str) -> MemoraResult<()> {
        let dims = self.embedder.embed(content.as_bytes());
        let mut vector = Vector { id, dims };
        if !vector.normalize() {
            return Err(MemoraError::InvalidInput(format!(
                "embedding for memory {id} has zero magnitude"
            )));
        }
        self.db.insert_vector(vector)
    }

    /// Look up a memory by id. Content is `None` if it was forgotten or is
    /// otherwise unrecoverable — never a placeholder (spec §4.6 Forget).
    pub fn get_memory(&self, id: NodeId) -> Option<Memory> {
        let node = self.db.get_node(id)?;
        let (type_tag, conf_tag, imp_tag) = node.memory_meta();
        let assoc = self.assoc.get(&id);
        Some(Memory {
            id,
            memory_type: MemoryType::from_u8(type_tag).unwrap_or(MemoryType::Experience),
            confidence: Confidence::from_u8(conf_tag).unwrap_or(Confidence::Medium),
            importance: Importance::from_u8(imp_tag).unwrap_or(Importance::Medium),
            content: self.content_cache.get(&id).cloned(),
            session_id: assoc.and_then(|a| a.session_id),
            user_id: assoc.and_then(|a| a.user_id),
            embedding: self.db.get_vector(id).map(|v| v.to_vec()),
        })
    }

    /// Re-store content/metadata for an existing memory (spec §4.6
    /// supplement; §4.6 store algorithm steps 2-6 re-run against `id`).
    /// `session_id`/`user_id` association is unchanged by update.
    pub fn update_memory(
        &mut self,
        id: NodeId,
        content: &str,
        confidence: Option<Confidence>,
        importance: Option<Importance>,
        create_embedding: bool,
    ) -> MemoraResult<()> {
        if content.is_empty() {
            return Err(MemoraError::InvalidInput("memory content must not be empty".into()));
        }
        let existing = self
            .db
            .get_node(id)
            .ok_or_else(|| MemoraError::not_found("memory", id))?;
        let (type_tag, conf_tag, imp_tag) = existing.memory_meta();
        let memory_type = MemoryType::from_u8(type_tag).unwrap_or(MemoryType::Experience);
        let confidence = confidence.unwrap_or_else(|| Confidence::from_u8(conf_tag).unwrap_or(Confidence::Medium));
        let importance = importance.unwrap_or_else(|| Importance::from_u8(imp_tag).unwrap_or(Importance::Medium));

        let blob = ContentBlob {
            memory_id: id,
            content: content.to_string(),
        };
        self.db.append_content(&blob)?;
        self.pending_content.push(blob);
        self.content_cache.insert(id, content.to_string());

        let label = truncate_utf8(content, LABEL_BYTES - 3);
        let node = Node::with_memory_label(id, memory_type.to_u8(), confidence.to_u8(), importance.to_u8(), &label);
        self.db.insert_node(node)?;

        if create_embedding {
            self.embed_and_store(id, content)?;
        }
        Ok(())
    }

    /// Forget a memory: clears its content, leaving the node and any edges
    /// in place (spec §4.6 Forget). A tombstone (empty-content) blob is
    /// appended so forgetting survives a restart — there is no dedicated
    /// log entry kind for it, so an empty `ContentBlob.content` is the
    /// on-disk signal that recovery treats as "remove from cache".
    pub fn forget_memory(&mut self, id: NodeId) -> MemoraResult<()> {
        if !self.memory_ids.contains(&id) {
            return Err(MemoraError::not_found("memory", id));
        }
        let tombstone = ContentBlob {
            memory_id: id,
            content: String::new(),
        };
        self.db.append_content(&tombstone)?;
        self.pending_content.retain(|b| b.memory_id != id);
        self.pending_content.push(tombstone);
        self.content_cache.remove(&id);
        self.db.soft_delete_vector(id);
        Ok(())
    }

    /// Append an edge between two existing memory/concept node ids (spec
    /// §4.6 supplement).
    pub fn create_relationship(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> MemoraResult<()> {
        self.db.insert_edge(Edge { from, to, kind })
    }

    /// Create a concept anchor node: a semantic-anchor node in the
    /// high-bit-set id space, used as a shared relationship target (spec §9
    /// concept-node high bit convention).
    pub fn create_concept_anchor(&mut self, label: &str) -> MemoraResult<NodeId> {
        let id = NodeId::concept_from_counter(self.next_concept_id);
        self.next_concept_id += 1;
        self.db.insert_node(Node::with_text_label(id, label))?;
        Ok(id)
    }

    /// Create a new session (in-memory only, spec §9 global mutable state).
    pub fn create_session(&mut self, user_id: u64, title: String, context: String) -> u64 {
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        let session = Session::new(session_id, user_id, title, context, now_micros());
        self.sessions.insert(session_id, session);
        session_id
    }

    /// Make `session_id` the active session for subsequent `store_memory`
    /// calls that omit an explicit `session_id`.
    pub fn set_current_session(&mut self, session_id: u64) -> MemoraResult<()> {
        if !self.sessions.contains_key(&session_id) {
            return Err(MemoraError::not_found("session", session_id));
        }
        self.current_session_id = Some(session_id);
        Ok(())
    }

    /// The currently active session, if any.
    pub fn get_current_session(&self) -> Option<&Session> {
        self.current_session_id.and_then(|id| self.sessions.get(&id))
    }

    /// `query_memories` pipeline (spec §4.6).
    pub fn query_memories(&self, query: &MemoryQuery) -> MemoraResult<MemoryQueryResult> {
        let start = Instant::now();

        let mut candidates: Vec<NodeId>;
        let mut scores: FxHashMap<NodeId, f32> = FxHashMap::default();

        if let Some(text) = &query.query_text {
            let dims = self.embedder.embed(text.as_bytes());
            let mut query_vec = Vector {
                id: NodeId::new(0),
                dims,
            };
            query_vec.normalize();
            let hits = self.db.query_similar_by_vector(&query_vec.dims, query.limit.max(1));
            candidates = Vec::with_capacity(hits.len());
            for (id, score) in hits {
                candidates.push(id);
                scores.insert(id, score);
            }
        } else {
            candidates = self.memory_ids.iter().copied().collect();
            candidates.sort();
        }

        candidates.retain(|id| self.passes_filters(*id, query));

        let mut related_memories = std::collections::HashMap::new();
        let mut relationships = Vec::new();
        if query.include_related {
            for &id in &candidates {
                if let Ok(related) = self.db.query_related(id, query.max_depth, None) {
                    related_memories.insert(id, related);
                }
                relationships.extend(self.db.outgoing_edges(id));
            }
        }

        if !scores.is_empty() {
            candidates.sort_by(|a, b| {
                scores
                    .get(b)
                    .unwrap_or(&f32::NEG_INFINITY)
                    .partial_cmp(scores.get(a).unwrap_or(&f32::NEG_INFINITY))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        candidates.truncate(query.limit);

        let memories: Vec<Memory> = candidates.iter().filter_map(|id| self.get_memory(*id)).collect();
        let similarity_scores: Vec<f32> = if scores.is_empty() {
            Vec::new()
        } else {
            candidates.iter().map(|id| scores.get(id).copied().unwrap_or(0.0)).collect()
        };

        Ok(MemoryQueryResult {
            memories,
            similarity_scores,
            related_memories,
            relationships,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn passes_filters(&self, id: NodeId, query: &MemoryQuery) -> bool {
        let node = match self.db.get_node(id) {
            Some(n) => n,
            None => return false,
        };
        let (type_tag, conf_tag, imp_tag) = node.memory_meta();
        let memory_type = MemoryType::from_u8(type_tag).unwrap_or(MemoryType::Experience);
        let confidence = Confidence::from_u8(conf_tag).unwrap_or(Confidence::Medium);
        let importance = Importance::from_u8(imp_tag).unwrap_or(Importance::Medium);

        if let Some(types) = &query.memory_types {
            if !types.contains(&memory_type) {
                return false;
            }
        }
        if let Some(min) = query.min_confidence {
            if confidence < min {
                return false;
            }
        }
        if let Some(min) = query.min_importance {
            if importance < min {
                return false;
            }
        }
        let assoc = self.assoc.get(&id);
        if let Some(session_id) = query.session_id {
            if assoc.and_then(|a| a.session_id) != Some(session_id) {
                return false;
            }
        }
        if let Some(user_id) = query.user_id {
            if assoc.and_then(|a| a.user_id) != Some(user_id) {
                return false;
            }
        }
        true
    }

    /// Aggregate counters over every memory and session ever created (spec
    /// §4.6 `get_statistics`).
    pub fn get_statistics(&self) -> MemoryStatistics {
        let mut by_type = std::collections::HashMap::new();
        for &id in &self.memory_ids {
            if let Some(node) = self.db.get_node(id) {
                let (type_tag, _, _) = node.memory_meta();
                let memory_type = MemoryType::from_u8(type_tag).unwrap_or(MemoryType::Experience);
                *by_type.entry(memory_type).or_insert(0u64) += 1;
            }
        }
        MemoryStatistics {
            total_memories: self.memory_ids.len() as u64,
            by_type,
            total_sessions: self.sessions.len() as u64,
            active_sessions: self.sessions.values().filter(|s| s.is_active).count() as u64,
        }
    }

    /// Content blobs not yet captured by any referenced snapshot sidecar —
    /// either appended this session, or recovered from the log tail / an
    /// orphan sidecar on open (spec §4.2 step 3). Draining also hands the
    /// caller everything to pass to `Database::create_snapshot`.
    pub fn drain_pending_content(&mut self) -> Vec<ContentBlob> {
        std::mem::take(&mut self.pending_content)
    }

    /// Borrow the underlying facade (e.g. for `get_stats`/`create_snapshot`
    /// orchestration at the root `Memora` facade level).
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Mutably borrow the underlying facade.
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }
}

fn apply_content_blob(
    cache: &mut FxHashMap<NodeId, String>,
    forgotten: &mut HashSet<NodeId>,
    blob: ContentBlob,
) {
    if blob.content.is_empty() {
        cache.remove(&blob.memory_id);
        forgotten.insert(blob.memory_id);
    } else {
        cache.insert(blob.memory_id, blob.content);
        forgotten.remove(&blob.memory_id);
    }
}

fn now_micros() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
