//! Error types for store driver operations.

use crate::document::DocId;
use std::io;
use thiserror::Error;

/// Result type for store driver operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A single document that a bulk write could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// The document id, when the store reported one.
    pub id: Option<DocId>,
    /// The store's reason for rejecting the document.
    pub reason: String,
}

impl WriteFailure {
    /// Creates a failure for a known document id.
    pub fn new(id: impl Into<DocId>, reason: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            reason: reason.into(),
        }
    }

    /// Creates a failure that is not attributed to one document.
    pub fn unattributed(reason: impl Into<String>) -> Self {
        Self {
            id: None,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during store driver operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed collection, index, mapping, database or cursor does not exist.
    #[error("{what} does not exist")]
    Missing {
        /// What was missing.
        what: String,
    },

    /// Attempted to create something that already exists.
    #[error("{what} already exists")]
    AlreadyExists {
        /// What already existed.
        what: String,
    },

    /// A write collided with an existing document id.
    #[error("duplicate key: {id}")]
    DuplicateKey {
        /// The colliding id.
        id: DocId,
    },

    /// A single request exceeded the store's payload ceiling.
    #[error("payload too large: {size} exceeds limit {limit}")]
    PayloadTooLarge {
        /// The size of the rejected request.
        size: usize,
        /// The store's ceiling.
        limit: usize,
    },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A bulk write was partially or fully rejected.
    #[error("bulk write failed: {written} written, {} failed", failures.len())]
    BulkWrite {
        /// Number of documents the store did write.
        written: u64,
        /// Per-document rejections.
        failures: Vec<WriteFailure>,
    },

    /// A document violated the document model.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other driver-level failure.
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Creates a missing-target error.
    pub fn missing(what: impl Into<String>) -> Self {
        Self::Missing { what: what.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Returns true if this error reports an absent target.
    pub fn is_missing(&self) -> bool {
        matches!(self, StoreError::Missing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::missing("index genes");
        assert_eq!(err.to_string(), "index genes does not exist");
        assert!(err.is_missing());

        let err = StoreError::BulkWrite {
            written: 3,
            failures: vec![WriteFailure::new("a", "duplicate key")],
        };
        assert_eq!(err.to_string(), "bulk write failed: 3 written, 1 failed");
        assert!(!err.is_missing());
    }

    #[test]
    fn payload_display_mentions_limit() {
        let err = StoreError::PayloadTooLarge { size: 20, limit: 16 };
        assert!(err.to_string().contains("20"));
        assert!(err.to_string().contains("16"));
    }
}
