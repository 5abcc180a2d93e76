//! Snapshot manifest: the JSON document that ties sidecar files to a
//! log cursor (spec §3, §4.2, §6).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use memora_core::{MemoraError, MemoraResult, SnapshotId};

/// Manifest describing one immutable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Monotonically increasing snapshot identifier.
    pub snapshot_id: u64,
    /// Microseconds since the Unix epoch when this snapshot was created.
    pub created_at: u64,
    /// Node counter, edge counter, vector counter at snapshot time (for stats).
    pub counters: SnapshotCounters,
    /// Node chunk file names, relative to the snapshot directory.
    pub node_files: Vec<String>,
    /// Edge chunk file names, relative to the snapshot directory.
    pub edge_files: Vec<String>,
    /// Vector chunk file names, relative to the snapshot directory.
    pub vector_files: Vec<String>,
    /// Memory content file names, relative to the shared `memory_contents/` dir.
    pub memory_content_files: Vec<String>,
    /// Log sequence number after which the log must be replayed to reach
    /// the state captured by this snapshot.
    pub log_cursor: u64,
}

/// Element counts captured in a manifest, used for `get_stats()` without
/// needing to re-read sidecar files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SnapshotCounters {
    /// Number of node records across all node chunk files.
    pub node_count: u64,
    /// Number of edge records across all edge chunk files.
    pub edge_count: u64,
    /// Number of vector records across all vector chunk files.
    pub vector_count: u64,
}

impl SnapshotManifest {
    /// Directory holding this manifest's sidecar files, given the snapshots root.
    pub fn dir(snapshots_root: &Path, snapshot_id: u64) -> PathBuf {
        snapshots_root.join(snapshot_id.to_string())
    }

    /// Path to this manifest's `manifest.json`, given the snapshots root.
    pub fn manifest_path(snapshots_root: &Path, snapshot_id: u64) -> PathBuf {
        Self::dir(snapshots_root, snapshot_id).join("manifest.json")
    }

    /// `SnapshotId` wrapper for this manifest's id.
    pub fn id(&self) -> SnapshotId {
        SnapshotId(self.snapshot_id)
    }

    /// Atomically write this manifest via write-to-temp + rename (spec §4.2
    /// step 4). The snapshot's directory must already exist.
    pub fn write_atomic(&self, snapshots_root: &Path) -> MemoraResult<()> {
        let dir = Self::dir(snapshots_root, self.snapshot_id);
        let final_path = dir.join("manifest.json");
        let temp_path = dir.join(".manifest.json.tmp");

        if final_path.exists() {
            return Err(MemoraError::already_exists("snapshot", self.snapshot_id));
        }

        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| MemoraError::Corruption(format!("cannot serialize manifest: {e}")))?;

        std::fs::write(&temp_path, &json).map_err(|e| MemoraError::io(&temp_path, e))?;
        // fsync the temp file before the rename so the rename target is
        // guaranteed durable on disk even across a crash right after.
        {
            let f = std::fs::File::open(&temp_path).map_err(|e| MemoraError::io(&temp_path, e))?;
            f.sync_all().map_err(|e| MemoraError::io(&temp_path, e))?;
        }
        std::fs::rename(&temp_path, &final_path).map_err(|e| MemoraError::io(&final_path, e))?;

        Ok(())
    }

    /// Read and parse a manifest file. A parse failure or truncated file
    /// returns `Corruption` describing a *partial manifest* — callers doing
    /// restore-with-fallback should treat this as "discard, try the prior
    /// snapshot" (spec §4.2).
    pub fn read(path: &Path) -> MemoraResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MemoraError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| MemoraError::Corruption(format!("partial manifest at {path:?}: {e}")))
    }

    /// Verify every sidecar file this manifest references exists. A missing
    /// sidecar is fatal per spec §4.2/§7 (`Corruption`, distinct from a
    /// partial manifest).
    pub fn verify_sidecars(&self, snapshots_root: &Path, content_dir: &Path) -> MemoraResult<()> {
        let dir = Self::dir(snapshots_root, self.snapshot_id);
        for name in self
            .node_files
            .iter()
            .chain(self.edge_files.iter())
            .chain(self.vector_files.iter())
        {
            let path = dir.join(name);
            if !path.is_file() {
                return Err(MemoraError::Corruption(format!(
                    "snapshot {}: missing sidecar {path:?}",
                    self.snapshot_id
                )));
            }
        }
        for name in &self.memory_content_files {
            let path = content_dir.join(name);
            if !path.is_file() {
                return Err(MemoraError::Corruption(format!(
                    "snapshot {}: missing memory content file {path:?}",
                    self.snapshot_id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_roundtrip() {
        let dir = tempdir().unwrap();
        let snapshots_root = dir.path();
        std::fs::create_dir_all(SnapshotManifest::dir(snapshots_root, 1)).unwrap();

        let manifest = SnapshotManifest {
            snapshot_id: 1,
            created_at: 123,
            counters: SnapshotCounters {
                node_count: 2,
                edge_count: 1,
                vector_count: 2,
            },
            node_files: vec!["nodes-0.bin".into()],
            edge_files: vec!["edges-0.bin".into()],
            vector_files: vec!["vectors-0.bin".into()],
            memory_content_files: vec![],
            log_cursor: 10,
        };
        manifest.write_atomic(snapshots_root).unwrap();

        let path = SnapshotManifest::manifest_path(snapshots_root, 1);
        let back = SnapshotManifest::read(&path).unwrap();
        assert_eq!(manifest, back);
    }

    #[test]
    fn second_write_is_already_exists() {
        let dir = tempdir().unwrap();
        let snapshots_root = dir.path();
        std::fs::create_dir_all(SnapshotManifest::dir(snapshots_root, 1)).unwrap();
        let manifest = SnapshotManifest {
            snapshot_id: 1,
            created_at: 1,
            counters: SnapshotCounters::default(),
            node_files: vec![],
            edge_files: vec![],
            vector_files: vec![],
            memory_content_files: vec![],
            log_cursor: 0,
        };
        manifest.write_atomic(snapshots_root).unwrap();
        let err = manifest.write_atomic(snapshots_root).unwrap_err();
        assert!(matches!(err, MemoraError::AlreadyExists { .. }));
    }

    #[test]
    fn missing_sidecar_is_corruption() {
        let dir = tempdir().unwrap();
        let snapshots_root = dir.path();
        std::fs::create_dir_all(SnapshotManifest::dir(snapshots_root, 1)).unwrap();
        let manifest = SnapshotManifest {
            snapshot_id: 1,
            created_at: 1,
            counters: SnapshotCounters::default(),
            node_files: vec!["nodes-0.bin".into()],
            edge_files: vec![],
            vector_files: vec![],
            memory_content_files: vec![],
            log_cursor: 0,
        };
        let err = manifest
            .verify_sidecars(snapshots_root, &dir.path().join("memory_contents"))
            .unwrap_err();
        assert!(matches!(err, MemoraError::Corruption(_)));
    }
}
