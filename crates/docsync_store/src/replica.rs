//! Replicated document store driver traits.

use crate::document::{DocId, Document};
use crate::error::StoreResult;
use std::sync::Arc;

/// Name of the revision field maintained by the replicated store.
pub const REV_FIELD: &str = "_rev";

/// Per-document outcome of a bulk update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocWriteOutcome {
    /// The document id.
    pub id: DocId,
    /// Whether the write was accepted.
    pub ok: bool,
    /// The rejection reason, if any.
    pub reason: Option<String>,
}

impl DocWriteOutcome {
    /// An accepted write.
    pub fn accepted(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            reason: None,
        }
    }

    /// A rejected write.
    pub fn rejected(id: impl Into<DocId>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// A server hosting named replicated databases.
pub trait ReplicaServer: Send + Sync {
    /// Opens an existing database.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Missing`] if the database does not exist.
    fn open(&self, name: &str) -> StoreResult<Arc<dyn ReplicaDb>>;

    /// Creates a database.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::AlreadyExists`] if another creator got there first.
    fn create(&self, name: &str) -> StoreResult<Arc<dyn ReplicaDb>>;

    /// Deletes a database.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Missing`] if the database does not exist.
    fn delete(&self, name: &str) -> StoreResult<()>;
}

/// One replicated database.
///
/// Documents carry a [`REV_FIELD`] revision; a write whose revision does not
/// match the stored one is rejected as a conflict.
pub trait ReplicaDb: Send + Sync {
    /// Returns the database name.
    fn name(&self) -> &str;

    /// Creates or updates documents in one request, reporting each outcome.
    fn bulk_update(&self, docs: Vec<Document>) -> StoreResult<Vec<DocWriteOutcome>>;

    /// Returns every document (the all-docs view with documents included).
    fn all_docs(&self) -> StoreResult<Vec<Document>>;

    /// Returns every id (the all-docs view without documents).
    fn all_ids(&self) -> StoreResult<Vec<DocId>>;

    /// Returns one document.
    fn get(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Ensures all accepted writes are committed.
    fn commit(&self) -> StoreResult<()>;

    /// Compacts the database.
    fn compact(&self) -> StoreResult<()>;
}
