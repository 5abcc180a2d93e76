//! Append log reader: full replay, tail replay, and crash-recovery truncation.
//!
//! # Failure semantics (spec §4.1)
//!
//! - CRC failure in the **tail** (nothing else follows that corrupted frame)
//!   is silently skipped: the log is truncated to the last good boundary.
//! - CRC failure in the **interior** (later frames still decode cleanly) is
//!   fatal and surfaces `Corruption` — a mid-file bit flip is not something
//!   crash recovery can paper over safely.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::Path;

use memora_core::{MemoraError, MemoraResult};

use super::frame::{validate_header, Frame, FrameDecodeError, LOG_HEADER_BYTES};

/// Scan `buf` (the file content after the header) frame by frame.
///
/// Returns the decoded frames, the byte offset (relative to `buf`) where
/// valid data ends, and whether the scan stopped because of interior
/// corruption (vs. a clean end-of-data or truncated tail).
fn scan_frames(buf: &[u8]) -> (Vec<Frame>, usize, bool) {
    let mut frames = Vec::new();
    let mut offset = 0usize;

    while offset < buf.len() {
        match Frame::from_bytes(&buf[offset..]) {
            Ok((frame, consumed)) => {
                frames.push(frame);
                offset += consumed;
            }
            Err(FrameDecodeError::Incomplete) => {
                // Truncated tail: stop here, this is not interior corruption.
                return (frames, offset, false);
            }
            Err(FrameDecodeError::UnknownKind(_)) => {
                // An unrecognized tag is only trustworthy as "tail garbage"
                // if nothing parseable follows; otherwise it's interior
                // corruption of the tag byte itself.
                if remainder_has_valid_frame(&buf[offset..]) {
                    return (frames, offset, true);
                }
                return (frames, offset, false);
            }
            Err(FrameDecodeError::ChecksumMismatch { consumed }) => {
                let rest = offset + consumed;
                if rest < buf.len() && remainder_has_valid_frame(&buf[rest..]) {
                    return (frames, offset, true);
                }
                return (frames, offset, false);
            }
        }
    }

    (frames, offset, false)
}

/// Whether any frame at all can be decoded starting somewhere in `buf`
/// (used only to tell "more good data follows" from "this was the tail").
fn remainder_has_valid_frame(buf: &[u8]) -> bool {
    !buf.is_empty() && Frame::from_bytes(buf).is_ok()
}

/// Truncate the log file at `path` to the last good frame boundary,
/// recovering from a crash mid-write. No-op if the file does not exist.
///
/// Fatal (`Corruption`) if interior corruption is detected, or if the file
/// is non-empty but too short to contain a valid header.
pub fn truncate_to_last_good_boundary(path: &Path) -> MemoraResult<()> {
    if !path.exists() {
        return Ok(());
    }

    let mut file = File::open(path).map_err(|e| MemoraError::io(path, e))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(|e| MemoraError::io(path, e))?;

    if buf.is_empty() {
        return Ok(());
    }

    if buf.len() < LOG_HEADER_BYTES || !validate_header(&buf) {
        return Err(MemoraError::Corruption(format!(
            "{path:?}: truncated or invalid log header"
        )));
    }

    let (_frames, body_end, interior_corrupt) = scan_frames(&buf[LOG_HEADER_BYTES..]);

    if interior_corrupt {
        return Err(MemoraError::Corruption(format!(
            "{path:?}: interior CRC mismatch past offset {}",
            LOG_HEADER_BYTES + body_end
        )));
    }

    let good_len = (LOG_HEADER_BYTES + body_end) as u64;
    if good_len != buf.len() as u64 {
        tracing::warn!(
            path = ?path,
            good_len,
            file_len = buf.len(),
            "truncating append log tail after crash"
        );
        let f = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| MemoraError::io(path, e))?;
        f.set_len(good_len).map_err(|e| MemoraError::io(path, e))?;
    }

    Ok(())
}

/// Lazily iterates decoded frames from an append log file, starting after
/// the given sequence number (or from the beginning when `after` is `None`).
pub struct LogIterator {
    frames: std::vec::IntoIter<Frame>,
}

impl LogIterator {
    /// Build an iterator over every frame in `path` (`iterator()`, §4.1).
    pub fn full(path: &Path) -> MemoraResult<Self> {
        Self::after(path, None)
    }

    /// Build an iterator over frames with `seq > after` (`tail_after(seq)`, §4.1).
    pub fn after(path: &Path, after: Option<u64>) -> MemoraResult<Self> {
        if !path.exists() {
            return Ok(LogIterator {
                frames: Vec::new().into_iter(),
            });
        }

        let mut file = File::open(path).map_err(|e| MemoraError::io(path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| MemoraError::io(path, e))?;

        if buf.is_empty() {
            return Ok(LogIterator {
                frames: Vec::new().into_iter(),
            });
        }
        if buf.len() < LOG_HEADER_BYTES || !validate_header(&buf) {
            return Err(MemoraError::Corruption(format!(
                "{path:?}: invalid log header"
            )));
        }

        let (frames, _end, interior_corrupt) = scan_frames(&buf[LOG_HEADER_BYTES..]);
        if interior_corrupt {
            return Err(MemoraError::Corruption(format!(
                "{path:?}: interior CRC mismatch during replay"
            )));
        }

        let filtered: Vec<Frame> = match after {
            Some(cutoff) => frames.into_iter().filter(|f| f.seq > cutoff).collect(),
            None => frames,
        };

        Ok(LogIterator {
            frames: filtered.into_iter(),
        })
    }
}

impl Iterator for LogIterator {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.frames.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::writer::AppendLog;
    use memora_core::RecordKind;
    use tempfile::tempdir;

    #[test]
    fn truncates_crash_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memora.log");

        {
            let mut log = AppendLog::open(&path, 1).unwrap();
            log.append(RecordKind::Node, &[1, 2, 3]).unwrap();
            log.append(RecordKind::Node, &[4, 5, 6]).unwrap();
        }

        // Simulate a crash: append a few garbage bytes that don't form a frame.
        {
            use std::io::Write;
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0xFF, 0x00, 0x01]).unwrap();
        }

        let pre_len = std::fs::metadata(&path).unwrap().len();
        truncate_to_last_good_boundary(&path).unwrap();
        let post_len = std::fs::metadata(&path).unwrap().len();
        assert!(post_len < pre_len);

        let frames: Vec<_> = LogIterator::full(&path).unwrap().collect();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn tail_after_filters_by_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memora.log");

        {
            let mut log = AppendLog::open(&path, 1).unwrap();
            for i in 0..5u8 {
                log.append(RecordKind::Node, &[i]).unwrap();
            }
        }

        let frames: Vec<_> = LogIterator::after(&path, Some(2)).unwrap().collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].seq, 3);
        assert_eq!(frames[1].seq, 4);
    }
}
