//! Durability primitives for Memora: the append-only write-ahead log and the
//! content-addressed snapshot manager (spec §4.1, §4.2). This crate owns all
//! bytes-on-disk formats; it knows nothing about graphs, vectors, or memories.

#![warn(missing_docs)]

pub mod log;
pub mod snapshot;

pub use log::{AppendLog, Frame, FrameDecodeError, LogIterator};
pub use snapshot::{SnapshotCounters, SnapshotManager, SnapshotManifest};
