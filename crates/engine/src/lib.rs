//! Graph index, HNSW vector index, query engine, and the `Database` facade
//! that coordinates them with `memora-durability` (spec §4.3-§4.5, §4.7).

#![warn(missing_docs)]

pub mod facade;
pub mod graph;
pub mod query;
pub mod recovery;
pub mod vector;

pub use facade::{Database, DatabaseStats};
pub use graph::GraphIndex;
pub use recovery::{restore_latest, RestoredSnapshot};
pub use vector::{similarity, HnswIndex};
