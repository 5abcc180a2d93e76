//! Database configuration.
//!
//! The core accepts a fully-populated `MemoraConfig` at open time; reading a
//! config *file* and watching it for changes is the external configuration
//! loader's job (out of scope, spec §1). `from_toml_file`/`to_toml_string`
//! are offered as a convenience the outer loader may use, not a required path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MemoraError, MemoraResult};
use crate::limits::VECTOR_DIMENSION;

/// HNSW vector index tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Target node degree at layers >= 1 (degree is `2*m` at layer 0).
    pub m: usize,
    /// Build-time beam width.
    pub ef_construction: usize,
    /// Search-time beam width.
    pub ef_search: usize,
    /// Seed for the deterministic level-assignment PRNG.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        HnswConfig {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            seed: 42,
        }
    }
}

/// Append-log tuning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Upper bound on how long a batched fsync may be deferred.
    pub fsync_window_ms: u64,
    /// Log append latency above which the facade refuses new writes with
    /// `Backpressure`.
    pub backpressure_high_watermark_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            fsync_window_ms: 1,
            backpressure_high_watermark_ms: 250,
        }
    }
}

/// Top-level Memora configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoraConfig {
    /// Data directory (log segments, snapshots/, memory_contents/).
    pub data_path: PathBuf,
    /// Create a snapshot automatically after this many writes since the
    /// last one. `0` disables automatic snapshotting.
    pub auto_snapshot_interval: u64,
    /// Whether graph/vector indices are persisted via snapshots at all, or
    /// rebuilt purely by full log replay on every open.
    pub enable_persistent_indexes: bool,
    /// Global vector dimension. Fixed at 128 for this spec; stored so the
    /// value travels with the config rather than being a silent constant.
    pub vector_dimension: usize,
    /// HNSW tuning parameters.
    pub hnsw: HnswConfig,
    /// Append-log tuning parameters.
    pub log: LogConfig,
}

impl Default for MemoraConfig {
    fn default() -> Self {
        MemoraConfig {
            data_path: PathBuf::from("./memora-data"),
            auto_snapshot_interval: 10_000,
            enable_persistent_indexes: true,
            vector_dimension: VECTOR_DIMENSION,
            hnsw: HnswConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl MemoraConfig {
    /// Build a config rooted at the given data directory, defaults otherwise.
    pub fn with_data_path(path: impl Into<PathBuf>) -> Self {
        MemoraConfig {
            data_path: path.into(),
            ..Default::default()
        }
    }

    /// Parse a config from a TOML file. Convenience for an external loader;
    /// not on the core's required path.
    pub fn from_toml_file(path: impl AsRef<Path>) -> MemoraResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MemoraError::io(path, e))?;
        toml::from_str(&content)
            .map_err(|e| MemoraError::InvalidInput(format!("invalid config at {:?}: {e}", path)))
    }

    /// Render this config as a pretty TOML string.
    pub fn to_toml_string(&self) -> MemoraResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MemoraError::InvalidInput(format!("cannot serialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = MemoraConfig::default();
        assert_eq!(cfg.hnsw.m, 16);
        assert_eq!(cfg.hnsw.ef_construction, 200);
        assert_eq!(cfg.hnsw.ef_search, 50);
        assert_eq!(cfg.vector_dimension, 128);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = MemoraConfig::with_data_path("/tmp/memora");
        let s = cfg.to_toml_string().unwrap();
        let parsed: MemoraConfig = toml::from_str(&s).unwrap();
        assert_eq!(cfg, parsed);
    }
}
