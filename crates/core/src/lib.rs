//! Core types shared across Memora: record layouts, identifiers,
//! configuration, and the unified error type.
//!
//! This crate has no I/O and no indices — it is the vocabulary every other
//! crate in the workspace builds on.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod ids;
pub mod limits;
pub mod record;

pub use config::{HnswConfig, LogConfig, MemoraConfig};
pub use error::{MemoraError, MemoraResult};
pub use ids::{NodeId, SequenceNumber, SnapshotId, CONCEPT_BIT};
pub use limits::{Limits, SESSION_CONTEXT_BYTES, VECTOR_DIMENSION};
pub use record::{
    ContentBlob, Edge, EdgeKind, Node, RecordKind, Vector, EDGE_RECORD_BYTES, LABEL_BYTES,
    NODE_RECORD_BYTES, VECTOR_RECORD_BYTES,
};
