//! Fixed-layout record types committed to the log and to snapshot sidecars.
//!
//! Every record here has a deterministic little-endian byte layout so it can
//! be written without per-record framing into snapshot chunk files (the log
//! itself adds its own framing around the same bytes; see `memora-durability`).

use crate::ids::NodeId;
use crate::limits::VECTOR_DIMENSION;
use serde::{Deserialize, Serialize};

/// Byte length of the overloaded node label.
pub const LABEL_BYTES: usize = 32;

/// On-disk byte size of a `Node` record.
pub const NODE_RECORD_BYTES: usize = 8 + LABEL_BYTES;

/// On-disk byte size of an `Edge` record.
pub const EDGE_RECORD_BYTES: usize = 8 + 8 + 1;

/// On-disk byte size of a `Vector` record.
pub const VECTOR_RECORD_BYTES: usize = 8 + VECTOR_DIMENSION * 4;

/// A graph node: `{id, label}`.
///
/// The 32-byte label is overloaded: for user-facing nodes it is a UTF-8
/// string zero-padded to 32 bytes; for memory nodes the first three bytes
/// encode `{memory_type, confidence, importance}` and the remaining bytes
/// carry a truncated display label. Full content is never stored here — it
/// lives in the content store (`ContentBlob`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier. High bit set => concept node (see `ids::NodeId`).
    pub id: NodeId,
    /// Overloaded 32-byte label.
    pub label: [u8; LABEL_BYTES],
}

impl Node {
    /// Build a user-facing node from a UTF-8 label, zero-padded/truncated to
    /// `LABEL_BYTES`.
    pub fn with_text_label(id: NodeId, text: &str) -> Self {
        let mut label = [0u8; LABEL_BYTES];
        let bytes = text.as_bytes();
        let n = bytes.len().min(LABEL_BYTES);
        label[..n].copy_from_slice(&bytes[..n]);
        Node { id, label }
    }

    /// Build a memory node with the first three label bytes carrying
    /// `{memory_type, confidence, importance}` and the remainder a truncated
    /// display label.
    pub fn with_memory_label(
        id: NodeId,
        memory_type: u8,
        confidence: u8,
        importance: u8,
        display: &str,
    ) -> Self {
        let mut label = [0u8; LABEL_BYTES];
        label[0] = memory_type;
        label[1] = confidence;
        label[2] = importance;
        let bytes = display.as_bytes();
        let n = bytes.len().min(LABEL_BYTES - 3);
        label[3..3 + n].copy_from_slice(&bytes[..n]);
        Node { id, label }
    }

    /// Decode the memory metadata triple from the first three label bytes.
    pub fn memory_meta(&self) -> (u8, u8, u8) {
        (self.label[0], self.label[1], self.label[2])
    }

    /// Interpret the label as a zero-padded UTF-8 string, lossily.
    pub fn label_text(&self) -> String {
        let end = self.label.iter().position(|&b| b == 0).unwrap_or(LABEL_BYTES);
        String::from_utf8_lossy(&self.label[..end]).into_owned()
    }

    /// Serialize to the fixed little-endian on-disk layout.
    pub fn to_bytes(&self) -> [u8; NODE_RECORD_BYTES] {
        let mut buf = [0u8; NODE_RECORD_BYTES];
        buf[0..8].copy_from_slice(&self.id.raw().to_le_bytes());
        buf[8..8 + LABEL_BYTES].copy_from_slice(&self.label);
        buf
    }

    /// Deserialize from the fixed little-endian on-disk layout.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < NODE_RECORD_BYTES {
            return None;
        }
        let id = NodeId::new(u64::from_le_bytes(buf[0..8].try_into().ok()?));
        let mut label = [0u8; LABEL_BYTES];
        label.copy_from_slice(&buf[8..8 + LABEL_BYTES]);
        Some(Node { id, label })
    }
}

/// Directed edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EdgeKind {
    /// Ownership relation.
    Owns = 0,
    /// Generic link.
    Links = 1,
    /// Loose association.
    Related = 2,
    /// Hierarchical parent/child relation.
    ChildOf = 3,
    /// Vector-similarity-derived relation.
    SimilarTo = 4,
}

impl EdgeKind {
    /// Decode from the on-disk tag byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(EdgeKind::Owns),
            1 => Some(EdgeKind::Links),
            2 => Some(EdgeKind::Related),
            3 => Some(EdgeKind::ChildOf),
            4 => Some(EdgeKind::SimilarTo),
            _ => None,
        }
    }
}

/// A directed edge: `{from, to, kind}`. No self-loops: `from != to` is
/// enforced at insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id.
    pub from: NodeId,
    /// Target node id.
    pub to: NodeId,
    /// Edge kind.
    pub kind: EdgeKind,
}

impl Edge {
    /// Serialize to the fixed little-endian on-disk layout.
    pub fn to_bytes(&self) -> [u8; EDGE_RECORD_BYTES] {
        let mut buf = [0u8; EDGE_RECORD_BYTES];
        buf[0..8].copy_from_slice(&self.from.raw().to_le_bytes());
        buf[8..16].copy_from_slice(&self.to.raw().to_le_bytes());
        buf[16] = self.kind as u8;
        buf
    }

    /// Deserialize from the fixed little-endian on-disk layout.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < EDGE_RECORD_BYTES {
            return None;
        }
        let from = NodeId::new(u64::from_le_bytes(buf[0..8].try_into().ok()?));
        let to = NodeId::new(u64::from_le_bytes(buf[8..16].try_into().ok()?));
        let kind = EdgeKind::from_u8(buf[16])?;
        Some(Edge { from, to, kind })
    }
}

/// A fixed-dimension vector keyed by id. All stored vectors are
/// unit-normalized; the index relies on cosine == dot-product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Vector id (SHOULD correspond to a node id; orphans are allowed).
    pub id: NodeId,
    /// `VECTOR_DIMENSION`-dimensional components.
    pub dims: Vec<f32>,
}

impl Vector {
    /// Magnitude (L2 norm) of the vector.
    pub fn magnitude(&self) -> f32 {
        self.dims.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// True if `|magnitude - 1| < 1e-5`, per the storage invariant.
    pub fn is_normalized(&self) -> bool {
        (self.magnitude() - 1.0).abs() < 1e-5
    }

    /// Normalize in place to unit length. No-op (returns false) on a
    /// zero vector, which cannot be normalized.
    pub fn normalize(&mut self) -> bool {
        let mag = self.magnitude();
        if mag == 0.0 || !mag.is_finite() {
            return false;
        }
        for x in self.dims.iter_mut() {
            *x /= mag;
        }
        true
    }

    /// Serialize to the fixed little-endian on-disk layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(VECTOR_RECORD_BYTES);
        buf.extend_from_slice(&self.id.raw().to_le_bytes());
        for x in &self.dims {
            buf.extend_from_slice(&x.to_le_bytes());
        }
        buf
    }

    /// Deserialize from the fixed little-endian on-disk layout.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < VECTOR_RECORD_BYTES {
            return None;
        }
        let id = NodeId::new(u64::from_le_bytes(buf[0..8].try_into().ok()?));
        let mut dims = Vec::with_capacity(VECTOR_DIMENSION);
        for i in 0..VECTOR_DIMENSION {
            let off = 8 + i * 4;
            dims.push(f32::from_le_bytes(buf[off..off + 4].try_into().ok()?));
        }
        Some(Vector { id, dims })
    }
}

/// Arbitrary-length content associated with a memory node. Lives only in the
/// log and in snapshot sidecar `memory_contents/*.json` files, never in the
/// node label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlob {
    /// The memory node this content belongs to.
    pub memory_id: NodeId,
    /// UTF-8 content bytes.
    pub content: String,
}

/// Tag byte identifying the payload kind of a log entry / sidecar record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordKind {
    /// `Node` payload.
    Node = 1,
    /// `Edge` payload.
    Edge = 2,
    /// `Vector` payload.
    Vector = 3,
    /// `ContentBlob` payload.
    MemoryContent = 4,
}

impl RecordKind {
    /// Decode from the on-disk tag byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(RecordKind::Node),
            2 => Some(RecordKind::Edge),
            3 => Some(RecordKind::Vector),
            4 => Some(RecordKind::MemoryContent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_roundtrip() {
        let node = Node::with_text_label(NodeId::new(7), "alice");
        let bytes = node.to_bytes();
        let back = Node::from_bytes(&bytes).unwrap();
        assert_eq!(node, back);
        assert_eq!(back.label_text(), "alice");
    }

    #[test]
    fn memory_label_roundtrip() {
        let node = Node::with_memory_label(NodeId::new(9), 1, 2, 3, "pref: concise");
        let (t, c, i) = node.memory_meta();
        assert_eq!((t, c, i), (1, 2, 3));
        let bytes = node.to_bytes();
        let back = Node::from_bytes(&bytes).unwrap();
        assert_eq!(back.memory_meta(), (1, 2, 3));
    }

    #[test]
    fn edge_roundtrip() {
        let edge = Edge {
            from: NodeId::new(1),
            to: NodeId::new(2),
            kind: EdgeKind::Related,
        };
        let bytes = edge.to_bytes();
        let back = Edge::from_bytes(&bytes).unwrap();
        assert_eq!(edge, back);
    }

    #[test]
    fn vector_normalize_and_roundtrip() {
        let mut v = Vector {
            id: NodeId::new(3),
            dims: vec![1.0; VECTOR_DIMENSION],
        };
        assert!(!v.is_normalized());
        assert!(v.normalize());
        assert!(v.is_normalized());
        let bytes = v.to_bytes();
        let back = Vector::from_bytes(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn zero_vector_does_not_normalize() {
        let mut v = Vector {
            id: NodeId::new(4),
            dims: vec![0.0; VECTOR_DIMENSION],
        };
        assert!(!v.normalize());
    }
}
