//! Identifier types and the concept/user id partition.
//!
//! Every node, edge endpoint, and vector is keyed by an unsigned 64-bit id.
//! Ids with the high bit set are reserved for "concept" nodes (semantic
//! anchors created by the memory layer); ids with the high bit clear are
//! user/memory nodes. This partition is an invariant enforced at insert.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High bit of a `u64`, used to partition concept ids from user/memory ids.
pub const CONCEPT_BIT: u64 = 1 << 63;

/// A node/vector identifier.
///
/// Wraps a raw `u64` so call sites can't accidentally mix ids with other
/// numeric fields, and so the concept/user partition has one place to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        NodeId(raw)
    }

    /// Raw `u64` value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// True if this id's high bit is set (a concept node).
    pub const fn is_concept(self) -> bool {
        self.0 & CONCEPT_BIT != 0
    }

    /// True if this id's high bit is clear (a user/memory node).
    pub const fn is_user(self) -> bool {
        !self.is_concept()
    }

    /// Derive the concept-space id corresponding to a user-space counter value.
    ///
    /// `counter` must not already have the high bit set; this is the only
    /// sanctioned way to mint a concept id so that the partition invariant
    /// can never be violated by accident.
    pub const fn concept_from_counter(counter: u64) -> Self {
        NodeId(counter | CONCEPT_BIT)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        NodeId(raw)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Monotonically increasing log sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceNumber {
    /// The sequence number before any entry has been written.
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    /// Next sequence number after this one.
    pub const fn next(self) -> SequenceNumber {
        SequenceNumber(self.0 + 1)
    }
}

/// Monotonically increasing snapshot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_partition() {
        let user = NodeId::new(42);
        assert!(user.is_user());
        assert!(!user.is_concept());

        let concept = NodeId::concept_from_counter(42);
        assert!(concept.is_concept());
        assert!(!concept.is_user());
        assert_eq!(concept.raw(), 42 | CONCEPT_BIT);
    }

    #[test]
    fn sequence_ordering() {
        let a = SequenceNumber(1);
        let b = a.next();
        assert!(b > a);
        assert_eq!(b.0, 2);
    }
}
