//! The uniform backend contract.

use crate::error::{BackendError, BackendResult};
use crate::options::BackendKind;
use crate::report::BatchReport;
use docsync_store::{DocId, Document, Fields};

/// A document backend.
///
/// Every backend supports this operation set; callers depend on the trait
/// only and hold backends as `Box<dyn DocBackend>`. Each concrete backend
/// documents its extensions on top.
///
/// # Invariants
///
/// - `update` never creates a document
/// - `drop_all` is idempotent; dropping an absent target is a no-op
/// - `get_from_id` fails with [`BackendError::NotFound`] for an absent id
/// - Partial failure inside `insert` is reported, never raised
/// - `finalize` runs at most once; a second call fails with
///   [`BackendError::AlreadyFinalized`]
///
/// # Implementors
///
/// - [`crate::MemoryBackend`]
/// - [`crate::DocumentStoreBackend`]
/// - [`crate::SearchIndexBackend`]
/// - [`crate::ReplicatedStoreBackend`]
pub trait DocBackend: Send {
    /// Returns the instance name used in logs and artifacts.
    fn name(&self) -> &str;

    /// Returns the backend kind.
    fn kind(&self) -> BackendKind;

    /// Idempotent setup, such as creating an index or opening a database.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the setup.
    fn prepare(&mut self) -> BackendResult<()> {
        Ok(())
    }

    /// Adds documents. Duplicate-id policy is backend-specific.
    ///
    /// # Errors
    ///
    /// Returns an error only when the whole call could not be attempted;
    /// per-document failures are in the returned report.
    fn insert(&mut self, docs: Vec<Document>) -> BackendResult<BatchReport>;

    /// Merges `patch` into the existing document `id`, returning how many
    /// documents were affected (or, for deferred writers, queued).
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn update(&mut self, id: &str, patch: Fields) -> BackendResult<u64>;

    /// Irreversibly removes all documents or the underlying collection/index.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails for a reason other than absence.
    fn drop_all(&mut self) -> BackendResult<()>;

    /// Returns every id. Ordering is backend-defined.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn get_id_list(&self) -> BackendResult<Vec<DocId>>;

    /// Returns one document.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::NotFound`] if the id is absent.
    fn get_from_id(&self, id: &str) -> BackendResult<Document>;

    /// Terminal flush/compact step ending a processing session.
    ///
    /// Returns the flush report for backends that buffer writes.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::AlreadyFinalized`] on a second call, or the
    /// store's error if flushing fails.
    fn finalize(&mut self) -> BackendResult<Option<BatchReport>> {
        Ok(None)
    }
}

/// Tracks the at-most-once `finalize` lifecycle.
#[derive(Debug, Default)]
pub(crate) struct FinalizeOnce {
    done: bool,
}

impl FinalizeOnce {
    /// Fails if `finalize` already completed.
    pub(crate) fn check(&self, backend: &str) -> BackendResult<()> {
        if self.done {
            return Err(BackendError::AlreadyFinalized {
                backend: backend.to_string(),
            });
        }
        Ok(())
    }

    /// Records a completed `finalize`.
    pub(crate) fn mark(&mut self) {
        self.done = true;
    }
}
