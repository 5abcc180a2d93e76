//! Size limits and fixed constants shared across the core.
//!
//! After stabilization these defaults are effectively frozen: the on-disk
//! vector record layout bakes `VECTOR_DIMENSION` in directly (no per-record
//! dimension field), so changing it is a storage-format break.

/// Global vector dimension. Fixed for this spec.
pub const VECTOR_DIMENSION: usize = 128;

/// Maximum bytes of UTF-8 content session `context` fields carry.
pub const SESSION_CONTEXT_BYTES: usize = 256;

/// Size limits enforced at insert time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum content blob size in bytes.
    pub max_content_bytes: usize,
    /// Maximum sidecar chunk file size in bytes before starting a new chunk.
    pub max_snapshot_chunk_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_content_bytes: 16 * 1024 * 1024,
            max_snapshot_chunk_bytes: 8 * 1024 * 1024,
        }
    }
}

impl Limits {
    /// Small limits for tests that want to exercise chunking cheaply.
    pub fn with_small_limits() -> Self {
        Limits {
            max_content_bytes: 4096,
            max_snapshot_chunk_bytes: 512,
        }
    }
}
