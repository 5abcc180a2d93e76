//! Log file header and record frame format.
//!
//! # File layout
//!
//! ```text
//! ┌────────────────────────────┐
//! │ File header (13 bytes)     │
//! ├────────────────────────────┤
//! │ Frame 1                    │
//! ├────────────────────────────┤
//! │ Frame 2                    │
//! ├────────────────────────────┤
//! │ ...                        │
//! └────────────────────────────┘
//! ```
//!
//! # Frame layout
//!
//! ```text
//! [u32 length][u8 kind][u64 seq][payload][u32 crc32(payload)]
//! ```
//!
//! `length` is the byte length of `payload` only. `kind` is a `RecordKind`
//! tag byte. Integers are little-endian throughout.

use memora_core::RecordKind;

/// Magic bytes identifying a Memora log file: "MLOG".
pub const LOG_MAGIC: [u8; 4] = *b"MLOG";

/// Current log file format version.
pub const LOG_FORMAT_VERSION: u8 = 1;

/// Size of the file header in bytes: magic (4) + version (1) + reserved (8).
pub const LOG_HEADER_BYTES: usize = 13;

/// Fixed overhead of a frame around its payload: length(4) + kind(1) + seq(8) + crc(4).
pub const FRAME_OVERHEAD_BYTES: usize = 4 + 1 + 8 + 4;

/// Build the file header bytes.
pub fn header_bytes() -> [u8; LOG_HEADER_BYTES] {
    let mut buf = [0u8; LOG_HEADER_BYTES];
    buf[0..4].copy_from_slice(&LOG_MAGIC);
    buf[4] = LOG_FORMAT_VERSION;
    buf
}

/// Validate a file header, returning `true` if magic and version are acceptable.
pub fn validate_header(buf: &[u8]) -> bool {
    buf.len() >= LOG_HEADER_BYTES && buf[0..4] == LOG_MAGIC && buf[4] == LOG_FORMAT_VERSION
}

/// A decoded log frame: one committed record plus its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number assigned at append time.
    pub seq: u64,
    /// Record kind tag.
    pub kind: RecordKind,
    /// Encoded record payload (kind-specific byte layout; see `memora-core::record`).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Encode this frame to its on-disk byte representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_OVERHEAD_BYTES + self.payload.len());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.payload);
        let crc = hasher.finalize();
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Attempt to decode one frame from the front of `buf`.
    ///
    /// Returns the decoded frame and the number of bytes consumed, or a
    /// `FrameDecodeError` describing why decoding stopped.
    pub fn from_bytes(buf: &[u8]) -> Result<(Frame, usize), FrameDecodeError> {
        if buf.len() < 4 {
            return Err(FrameDecodeError::Incomplete);
        }
        let length = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        let total = FRAME_OVERHEAD_BYTES + length;
        if buf.len() < total {
            return Err(FrameDecodeError::Incomplete);
        }
        let kind_byte = buf[4];
        let kind = RecordKind::from_u8(kind_byte).ok_or(FrameDecodeError::UnknownKind(kind_byte))?;
        let seq = u64::from_le_bytes(buf[5..13].try_into().unwrap());
        let payload = buf[13..13 + length].to_vec();
        let stored_crc = u32::from_le_bytes(buf[13 + length..total].try_into().unwrap());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let actual_crc = hasher.finalize();

        if actual_crc != stored_crc {
            return Err(FrameDecodeError::ChecksumMismatch { consumed: total });
        }

        Ok((Frame { seq, kind, payload }, total))
    }
}

/// Reasons a frame failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecodeError {
    /// Not enough bytes remain to decode a complete frame (normal at a
    /// crash-truncated tail).
    Incomplete,
    /// The tag byte did not match a known `RecordKind`.
    UnknownKind(u8),
    /// CRC32 over the payload did not match the stored checksum. `consumed`
    /// is how many bytes this frame *would* have occupied had the length
    /// field been trustworthy, used to decide tail-vs-interior.
    ChecksumMismatch { consumed: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let frame = Frame {
            seq: 5,
            kind: RecordKind::Node,
            payload: vec![1, 2, 3, 4],
        };
        let bytes = frame.to_bytes();
        let (decoded, consumed) = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, frame);
    }

    #[test]
    fn truncated_frame_is_incomplete() {
        let frame = Frame {
            seq: 1,
            kind: RecordKind::Edge,
            payload: vec![9; 17],
        };
        let bytes = frame.to_bytes();
        let truncated = &bytes[..bytes.len() - 3];
        assert_eq!(
            Frame::from_bytes(truncated).unwrap_err(),
            FrameDecodeError::Incomplete
        );
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let frame = Frame {
            seq: 2,
            kind: RecordKind::Vector,
            payload: vec![1, 2, 3],
        };
        let mut bytes = frame.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        match Frame::from_bytes(&bytes) {
            Err(FrameDecodeError::ChecksumMismatch { consumed }) => {
                assert_eq!(consumed, bytes.len())
            }
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }
}
