//! Reading snapshot sidecars and orphan content discovery (spec §4.2 Restore
//! algorithm, step 4 in particular).

use std::collections::HashSet;
use std::path::Path;

use memora_core::{
    ContentBlob, Edge, MemoraError, MemoraResult, Node, Vector, EDGE_RECORD_BYTES,
    NODE_RECORD_BYTES, VECTOR_RECORD_BYTES,
};

use super::manifest::SnapshotManifest;

/// List every snapshot id under `snapshots_root`, sorted ascending.
/// Non-numeric directory entries are ignored.
pub fn list_snapshot_ids(snapshots_root: &Path) -> MemoraResult<Vec<u64>> {
    if !snapshots_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(snapshots_root).map_err(|e| MemoraError::io(snapshots_root, e))? {
        let entry = entry.map_err(|e| MemoraError::io(snapshots_root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(id) = name.parse::<u64>() {
                ids.push(id);
            }
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

fn read_chunks(dir: &Path, files: &[String], record_size: usize) -> MemoraResult<Vec<u8>> {
    let mut buf = Vec::new();
    for name in files {
        let path = dir.join(name);
        let bytes = std::fs::read(&path).map_err(|e| MemoraError::io(&path, e))?;
        if bytes.len() % record_size != 0 {
            return Err(MemoraError::Corruption(format!(
                "{path:?}: size {} is not a multiple of record size {record_size}",
                bytes.len()
            )));
        }
        buf.extend_from_slice(&bytes);
    }
    Ok(buf)
}

/// Decode all node records referenced by `manifest` from its sidecar chunk files.
pub fn read_nodes(snapshots_root: &Path, manifest: &SnapshotManifest) -> MemoraResult<Vec<Node>> {
    let dir = SnapshotManifest::dir(snapshots_root, manifest.snapshot_id);
    let buf = read_chunks(&dir, &manifest.node_files, NODE_RECORD_BYTES)?;
    decode_fixed(&buf, NODE_RECORD_BYTES, Node::from_bytes, &dir)
}

/// Decode all edge records referenced by `manifest` from its sidecar chunk files.
pub fn read_edges(snapshots_root: &Path, manifest: &SnapshotManifest) -> MemoraResult<Vec<Edge>> {
    let dir = SnapshotManifest::dir(snapshots_root, manifest.snapshot_id);
    let buf = read_chunks(&dir, &manifest.edge_files, EDGE_RECORD_BYTES)?;
    decode_fixed(&buf, EDGE_RECORD_BYTES, Edge::from_bytes, &dir)
}

/// Decode all vector records referenced by `manifest` from its sidecar chunk files.
pub fn read_vectors(snapshots_root: &Path, manifest: &SnapshotManifest) -> MemoraResult<Vec<Vector>> {
    let dir = SnapshotManifest::dir(snapshots_root, manifest.snapshot_id);
    let buf = read_chunks(&dir, &manifest.vector_files, VECTOR_RECORD_BYTES)?;
    decode_fixed(&buf, VECTOR_RECORD_BYTES, Vector::from_bytes, &dir)
}

fn decode_fixed<T>(
    buf: &[u8],
    record_size: usize,
    decode: impl Fn(&[u8]) -> Option<T>,
    dir: &Path,
) -> MemoraResult<Vec<T>> {
    let mut out = Vec::with_capacity(buf.len() / record_size.max(1));
    let mut offset = 0;
    while offset + record_size <= buf.len() {
        let record = decode(&buf[offset..offset + record_size]).ok_or_else(|| {
            MemoraError::Corruption(format!("{dir:?}: failed to decode record at offset {offset}"))
        })?;
        out.push(record);
        offset += record_size;
    }
    Ok(out)
}

/// Read one `memory_contents/<uuid>.json` file back into a `ContentBlob`.
pub fn read_memory_content_file(path: &Path) -> MemoraResult<ContentBlob> {
    let content = std::fs::read_to_string(path).map_err(|e| MemoraError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| MemoraError::Corruption(format!("bad content file {path:?}: {e}")))
}

/// Load every content blob a manifest references, in file-list order
/// (spec §4.2 Restore step 4, the "for each referenced content file" part).
pub fn load_referenced_contents(
    content_dir: &Path,
    manifest: &SnapshotManifest,
) -> MemoraResult<Vec<ContentBlob>> {
    manifest
        .memory_content_files
        .iter()
        .map(|name| read_memory_content_file(&content_dir.join(name)))
        .collect()
}

/// Scan `content_dir` for `.json` files not named in `referenced`, loading
/// them as orphans (spec §4.2 Restore step 4 / §4.6 Recovery step 3). An
/// unreferenced content file is recovered by loading, not fatal (§7).
pub fn load_orphan_contents(
    content_dir: &Path,
    referenced: &HashSet<String>,
) -> MemoraResult<Vec<ContentBlob>> {
    if !content_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut orphans = Vec::new();
    for entry in std::fs::read_dir(content_dir).map_err(|e| MemoraError::io(content_dir, e))? {
        let entry = entry.map_err(|e| MemoraError::io(content_dir, e))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".json") || referenced.contains(name) {
            continue;
        }
        match read_memory_content_file(&path) {
            Ok(blob) => orphans.push(blob),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "skipping unreadable orphan content file");
            }
        }
    }
    Ok(orphans)
}
