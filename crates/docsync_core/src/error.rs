//! Error types for DocSync backends.

use docsync_store::{DocId, StoreError};
use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur in backend operations.
///
/// `NotFound` is the single policy for absent ids: every backend's
/// `get_from_id` fails with it, none returns a nullable result.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A required option for the chosen backend kind is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The requested document does not exist.
    #[error("document not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: DocId,
    },

    /// A bulk write partially or fully failed and the caller asked to escalate.
    #[error("batch failure: {failed} of {total} documents failed")]
    BatchFailure {
        /// Documents in the batch.
        total: u64,
        /// Documents that failed.
        failed: u64,
    },

    /// A single request would exceed the store's payload ceiling.
    #[error("request exceeds payload ceiling: {size} > {limit}")]
    SizeLimitExceeded {
        /// The size of the rejected request.
        size: usize,
        /// The store's ceiling.
        limit: usize,
    },

    /// The store connection could not be established or resolved.
    #[error("dependency unavailable: {message}")]
    DependencyUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// A document violated the document model.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Operation not permitted with the given arguments or in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// `finalize` was called a second time.
    #[error("backend {backend} is already finalized")]
    AlreadyFinalized {
        /// The backend name.
        backend: String,
    },

    /// A snapshot could not be written or read.
    #[error("snapshot error: {message}")]
    Snapshot {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BackendError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(id: impl Into<DocId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a dependency-unavailable error.
    pub fn dependency_unavailable(message: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a snapshot error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Returns true for [`BackendError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PayloadTooLarge { size, limit } => Self::SizeLimitExceeded { size, limit },
            StoreError::Unavailable(message) => Self::DependencyUnavailable { message },
            StoreError::InvalidDocument(message) => Self::InvalidDocument(message),
            StoreError::Io(err) => Self::Io(err),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_taxonomy() {
        let err: BackendError = StoreError::PayloadTooLarge { size: 9, limit: 4 }.into();
        assert!(matches!(err, BackendError::SizeLimitExceeded { size: 9, limit: 4 }));

        let err: BackendError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, BackendError::DependencyUnavailable { .. }));

        let err: BackendError = StoreError::missing("index").into();
        assert!(matches!(err, BackendError::Store(StoreError::Missing { .. })));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            BackendError::not_found("1017").to_string(),
            "document not found: 1017"
        );
        assert_eq!(
            BackendError::BatchFailure { total: 10, failed: 2 }.to_string(),
            "batch failure: 2 of 10 documents failed"
        );
        assert!(BackendError::not_found("x").is_not_found());
        assert!(!BackendError::configuration("x").is_not_found());
    }
}
