//! Append log writer: buffered-then-flush with a bounded batched-fsync window.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use memora_core::{MemoraError, MemoraResult, RecordKind};

use super::frame::{header_bytes, Frame};
use super::reader::{truncate_to_last_good_boundary, LogIterator};

/// Append-only log writer over a single `memora.log` file.
///
/// Writes are buffered then flushed on every append (teacher's
/// buffered-then-flush commit path); `fsync_window_ms` bounds how long a
/// batched fsync may be deferred beyond that per-append flush, per spec §4.1.
pub struct AppendLog {
    path: PathBuf,
    file: BufWriter<File>,
    next_seq: u64,
    fsync_window_ms: u64,
    bytes_since_fsync: u64,
    last_fsync: Instant,
}

impl AppendLog {
    /// Open (or create) the log file at `path`, recovering a truncated tail
    /// if the previous run crashed mid-write (§4.1 failure semantics).
    pub fn open(path: impl Into<PathBuf>, fsync_window_ms: u64) -> MemoraResult<Self> {
        let path = path.into();

        truncate_to_last_good_boundary(&path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| MemoraError::io(&path, e))?;

        let file_len = file.metadata().map_err(|e| MemoraError::io(&path, e))?.len();

        let next_seq = if file_len == 0 {
            file.write_all(&header_bytes())
                .map_err(|e| MemoraError::io(&path, e))?;
            file.sync_all().map_err(|e| MemoraError::io(&path, e))?;
            0
        } else {
            LogIterator::full(&path)?
                .last()
                .map(|f| f.seq + 1)
                .unwrap_or(0)
        };

        Ok(AppendLog {
            path,
            file: BufWriter::new(file),
            next_seq,
            fsync_window_ms,
            bytes_since_fsync: 0,
            last_fsync: Instant::now(),
        })
    }

    /// Path to the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next sequence number that will be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Append one record. Returns its assigned sequence number.
    ///
    /// Flushes the buffered writer unconditionally; fsyncs immediately if
    /// the configured batching window has already elapsed, otherwise defers
    /// the fsync (caller may force one via `fsync()`).
    pub fn append(&mut self, kind: RecordKind, payload: &[u8]) -> MemoraResult<u64> {
        let seq = self.next_seq;
        let frame = Frame {
            seq,
            kind,
            payload: payload.to_vec(),
        };
        let bytes = frame.to_bytes();

        self.file
            .write_all(&bytes)
            .map_err(|e| MemoraError::io(&self.path, e))?;
        self.file.flush().map_err(|e| MemoraError::io(&self.path, e))?;

        self.next_seq += 1;
        self.bytes_since_fsync += bytes.len() as u64;

        if self.last_fsync.elapsed().as_millis() as u64 >= self.fsync_window_ms {
            self.fsync()?;
        }

        Ok(seq)
    }

    /// Force an fsync of the underlying file, required after every
    /// externally acknowledged write that demands durability (snapshot
    /// creation, caller-requested barrier).
    pub fn fsync(&mut self) -> MemoraResult<()> {
        self.file
            .get_ref()
            .sync_all()
            .map_err(|e| MemoraError::io(&self.path, e))?;
        self.bytes_since_fsync = 0;
        self.last_fsync = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_assigns_monotonic_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memora.log");
        let mut log = AppendLog::open(&path, 1).unwrap();
        assert_eq!(log.append(RecordKind::Node, &[1]).unwrap(), 0);
        assert_eq!(log.append(RecordKind::Node, &[2]).unwrap(), 1);
        assert_eq!(log.next_seq(), 2);
    }

    #[test]
    fn reopen_resumes_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memora.log");
        {
            let mut log = AppendLog::open(&path, 1).unwrap();
            log.append(RecordKind::Node, &[1]).unwrap();
            log.append(RecordKind::Node, &[2]).unwrap();
        }
        let log = AppendLog::open(&path, 1).unwrap();
        assert_eq!(log.next_seq(), 2);
    }
}
