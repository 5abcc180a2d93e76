//! Error types for Memora
//!
//! This module defines the unified error type used throughout the system.
//! We use `thiserror` for automatic `Display` and `std::error::Error` impls.
//!
//! ## Error Categories
//!
//! - **InvalidInput**: bad id, wrong vector dimension, non-normalizable vector
//! - **NotFound**: node/vector/memory/session id absent
//! - **Backpressure**: log latency high; retryable
//! - **Corruption**: interior log CRC mismatch, missing referenced sidecar
//! - **Io**: underlying disk error
//! - **AlreadyExists**: snapshot id collision (not an error for node/vector)

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Memora operations.
pub type MemoraResult<T> = std::result::Result<T, MemoraError>;

/// Unified error type for all Memora core operations.
#[derive(Debug, Error)]
pub enum MemoraError {
    /// Bad id, wrong vector dimension, non-normalizable vector, empty content
    /// where required.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Node/vector/memory/session id absent.
    #[error("not found: {kind} {id}")]
    NotFound {
        /// What kind of entity was missing (node, vector, memory, session, snapshot).
        kind: &'static str,
        /// String form of the id that was looked up.
        id: String,
    },

    /// Log append latency exceeded the configured high-water mark. Retryable.
    #[error("backpressure: log latency {observed_ms}ms exceeds high-water mark {limit_ms}ms")]
    Backpressure {
        /// Observed latency in milliseconds.
        observed_ms: u64,
        /// Configured high-water mark in milliseconds.
        limit_ms: u64,
    },

    /// Interior log CRC mismatch, or a sidecar file referenced by a manifest
    /// is missing or fails to parse. Fatal; the core refuses further writes.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Underlying disk I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failing operation, if known.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Snapshot id collision. Not an error for node/vector overwrite.
    #[error("already exists: {kind} {id}")]
    AlreadyExists {
        /// What kind of entity collided (snapshot).
        kind: &'static str,
        /// String form of the colliding id.
        id: String,
    },
}

impl MemoraError {
    /// Construct a `NotFound` error for the given entity kind and id.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        MemoraError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Construct an `AlreadyExists` error for the given entity kind and id.
    pub fn already_exists(kind: &'static str, id: impl ToString) -> Self {
        MemoraError::AlreadyExists {
            kind,
            id: id.to_string(),
        }
    }

    /// Wrap an I/O error with the path that was being operated on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MemoraError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller can reasonably retry this operation as-is.
    ///
    /// Only `Backpressure` is retryable: every other variant reflects either
    /// a programming error (`InvalidInput`), a permanent absence (`NotFound`),
    /// unrecoverable on-disk state (`Corruption`), an I/O fault that needs
    /// operator attention, or a legitimate id collision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MemoraError::Backpressure { .. })
    }

    /// Whether this error means the database must stop accepting writes.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MemoraError::Corruption(_))
    }
}
