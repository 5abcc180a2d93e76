//! Restore orchestration across the snapshot history (spec §9 open question
//! resolution): `SnapshotManager::load_snapshot` is strict — a partial
//! manifest or a missing sidecar for *one* snapshot always surfaces
//! `Corruption`. This module is what actually picks which snapshot to use,
//! walking from the newest snapshot backwards and falling back to the next
//! older one whenever a load fails, matching spec §8 scenario S6.

use memora_durability::{SnapshotManager, SnapshotManifest};
use memora_core::{ContentBlob, Edge, MemoraError, MemoraResult, Node, Vector};

/// Decoded state recovered from the newest snapshot that loads cleanly.
pub struct RestoredSnapshot {
    /// The manifest that was selected.
    pub manifest: SnapshotManifest,
    /// Decoded node records.
    pub nodes: Vec<Node>,
    /// Decoded edge records.
    pub edges: Vec<Edge>,
    /// Decoded vector records.
    pub vectors: Vec<Vector>,
    /// Content blobs the manifest references.
    pub contents: Vec<ContentBlob>,
}

/// Try every snapshot newest-to-oldest, returning the first that loads
/// cleanly. `Ok(None)` means there are no snapshots at all (a fresh
/// database). `Err` is only returned once every candidate has failed to
/// load, carrying the most recent failure's `Corruption`.
pub fn restore_latest(snapshots: &SnapshotManager) -> MemoraResult<Option<RestoredSnapshot>> {
    let mut ids = snapshots.list_snapshots()?;
    ids.sort_by(|a, b| b.cmp(a)); // newest first

    let mut last_err: Option<MemoraError> = None;
    for id in ids {
        match load_one(snapshots, id.0) {
            Ok(restored) => return Ok(Some(restored)),
            Err(e) => {
                tracing::warn!(
                    snapshot_id = id.0,
                    error = %e,
                    "snapshot failed to load, falling back to an older one"
                );
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(None),
    }
}

fn load_one(snapshots: &SnapshotManager, id: u64) -> MemoraResult<RestoredSnapshot> {
    let manifest = snapshots.load_snapshot(memora_core::SnapshotId(id))?;
    let nodes = snapshots.read_nodes(&manifest)?;
    let edges = snapshots.read_edges(&manifest)?;
    let vectors = snapshots.read_vectors(&manifest)?;
    let contents = snapshots.load_memory_contents(&manifest)?;
    Ok(RestoredSnapshot {
        manifest,
        nodes,
        edges,
        vectors,
        contents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memora_core::NodeId;
    use tempfile::tempdir;

    #[test]
    fn no_snapshots_is_ok_none() {
        let dir = tempdir().unwrap();
        let mgr = SnapshotManager::new(dir.path());
        let result = restore_latest(&mgr).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn falls_back_to_older_snapshot_on_corruption() {
        let dir = tempdir().unwrap();
        let mgr = SnapshotManager::new(dir.path());

        let good_nodes = vec![Node::with_text_label(NodeId::new(1), "a")];
        mgr.create_snapshot(1, 1, 0, &good_nodes, &[], &[], &[], 4096)
            .unwrap();
        let bad_nodes = vec![Node::with_text_label(NodeId::new(2), "b")];
        let bad = mgr
            .create_snapshot(2, 2, 1, &bad_nodes, &[], &[], &[], 4096)
            .unwrap();

        // Corrupt snapshot 2's only sidecar.
        let sidecar = SnapshotManifest::dir(mgr.snapshots_dir(), 2).join(&bad.node_files[0]);
        std::fs::remove_file(sidecar).unwrap();

        let restored = restore_latest(&mgr).unwrap().unwrap();
        assert_eq!(restored.manifest.snapshot_id, 1);
        assert_eq!(restored.nodes, good_nodes);
    }

    #[test]
    fn propagates_corruption_when_nothing_loads() {
        let dir = tempdir().unwrap();
        let mgr = SnapshotManager::new(dir.path());
        let nodes = vec![Node::with_text_label(NodeId::new(1), "a")];
        let manifest = mgr
            .create_snapshot(1, 1, 0, &nodes, &[], &[], &[], 4096)
            .unwrap();
        let sidecar = SnapshotManifest::dir(mgr.snapshots_dir(), 1).join(&manifest.node_files[0]);
        std::fs::remove_file(sidecar).unwrap();

        let err = restore_latest(&mgr).unwrap_err();
        assert!(matches!(err, MemoraError::Corruption(_)));
    }
}
