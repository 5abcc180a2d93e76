//! Vector (HNSW) index (spec §4.4).

mod distance;
mod hnsw;

pub use distance::similarity;
pub use hnsw::HnswIndex;
