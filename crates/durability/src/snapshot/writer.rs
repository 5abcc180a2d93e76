//! Sidecar and manifest writing for snapshot creation (spec §4.2 Create algorithm).

use std::path::{Path, PathBuf};

use memora_core::{ContentBlob, MemoraError, MemoraResult};

/// Write `records` (each already encoded to its fixed on-disk byte layout)
/// into one or more chunk files under `dir`, named `<prefix>-<chunk>.bin`,
/// starting a new chunk once the running size would exceed `max_chunk_bytes`.
///
/// Chunk files are concatenations of fixed records with no per-record
/// framing (spec §6); the manifest carries the element count separately.
pub fn write_record_chunks(
    dir: &Path,
    prefix: &str,
    records: &[Vec<u8>],
    max_chunk_bytes: usize,
) -> MemoraResult<Vec<String>> {
    std::fs::create_dir_all(dir).map_err(|e| MemoraError::io(dir, e))?;

    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut chunk_index = 0usize;
    let mut current = Vec::new();

    for record in records {
        if !current.is_empty() && current.len() + record.len() > max_chunk_bytes {
            files.push(flush_chunk(dir, prefix, chunk_index, &current)?);
            chunk_index += 1;
            current = Vec::new();
        }
        current.extend_from_slice(record);
    }
    if !current.is_empty() {
        files.push(flush_chunk(dir, prefix, chunk_index, &current)?);
    }

    Ok(files)
}

fn flush_chunk(dir: &Path, prefix: &str, index: usize, bytes: &[u8]) -> MemoraResult<String> {
    let name = format!("{prefix}-{index}.bin");
    let path = dir.join(&name);
    std::fs::write(&path, bytes).map_err(|e| MemoraError::io(&path, e))?;
    Ok(name)
}

/// Write each pending content blob into its own `memory_contents/<uuid>.json`
/// file (spec §4.2 step 3). Returns the file names written, one per blob, in
/// the same order as `blobs`.
pub fn write_content_files(content_dir: &Path, blobs: &[ContentBlob]) -> MemoraResult<Vec<String>> {
    std::fs::create_dir_all(content_dir).map_err(|e| MemoraError::io(content_dir, e))?;

    let mut names = Vec::with_capacity(blobs.len());
    for blob in blobs {
        let name = format!("{}.json", uuid::Uuid::new_v4());
        let path: PathBuf = content_dir.join(&name);
        let json = serde_json::to_vec_pretty(blob)
            .map_err(|e| MemoraError::Corruption(format!("cannot serialize content blob: {e}")))?;
        std::fs::write(&path, json).map_err(|e| MemoraError::io(&path, e))?;
        names.push(name);
    }
    Ok(names)
}
