//! LLM-facing semantic memory layer: memories, sessions, relationships, and
//! the `query_memories` pipeline over `memora-engine::Database` (spec §4.6).

#![warn(missing_docs)]

pub mod embedding;
pub mod manager;
pub mod types;

pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use manager::MemoryManager;
pub use types::{
    Confidence, Importance, Memory, MemoryQuery, MemoryQueryResult, MemoryStatistics, MemoryType,
    Session, Source, StoreOptions,
};
