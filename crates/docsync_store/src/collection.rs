//! Document database collection driver trait.

use crate::document::{DocId, Document, Fields};
use crate::error::StoreResult;

/// Durability flush mode for [`DocumentCollection::fsync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsyncMode {
    /// Request the flush and return without waiting for acknowledgment.
    #[default]
    Async,
    /// Wait until the store acknowledges the flush.
    Blocking,
}

/// One operation of an ordered bulk `$set` batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOp {
    /// The target document id.
    pub id: DocId,
    /// Fields to overwrite.
    pub set: Fields,
    /// Whether to create the document when it does not exist.
    pub upsert: bool,
}

/// Counters returned by an ordered bulk batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    /// Documents matched by a find clause (modified or not).
    pub matched: u64,
    /// Documents actually changed.
    pub modified: u64,
    /// Documents created by upsert.
    pub upserted: u64,
    /// Documents inserted by insert operations.
    pub inserted: u64,
    /// Documents removed by delete operations.
    pub removed: u64,
}

/// A single-document update: `$set` plus `$unset`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    /// Fields to overwrite.
    pub set: Fields,
    /// Field names to remove.
    pub unset: Vec<String>,
}

impl UpdateSpec {
    /// Returns true if the update would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// Counters returned by a single-document update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents matched (0 or 1).
    pub matched: u64,
    /// Documents changed (0 or 1).
    pub modified: u64,
}

/// A handle to one collection of a document database.
///
/// Implementations wrap a driver's collection object. Queries that take an id
/// slice are sent as a single `$in` request and are subject to the store's
/// payload ceiling; callers are responsible for chunking.
pub trait DocumentCollection: Send + Sync {
    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Returns the number of documents in the collection.
    fn count(&self) -> StoreResult<u64>;

    /// Inserts documents in one request, returning the inserted ids.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::BulkWrite`] if any document collides with
    /// an existing id.
    fn insert_many(&self, docs: Vec<Document>) -> StoreResult<Vec<DocId>>;

    /// Executes an ordered bulk batch of find-by-id + `$set` operations.
    fn bulk_set(&self, ops: Vec<SetOp>) -> StoreResult<BulkWriteResult>;

    /// Applies `$set`/`$unset` to the document with the given id.
    fn update_one(&self, id: &str, spec: UpdateSpec, upsert: bool) -> StoreResult<UpdateResult>;

    /// Drops the collection. Dropping an absent collection succeeds.
    fn drop_collection(&self) -> StoreResult<()>;

    /// Returns every id, projecting nothing but `_id`.
    fn find_ids(&self) -> StoreResult<Vec<DocId>>;

    /// Returns the document with the given id.
    fn find_one(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Returns documents whose id is in `ids`, in store order.
    fn find_in(&self, ids: &[DocId]) -> StoreResult<Vec<Document>>;

    /// Counts documents whose id is in `ids`.
    fn count_in(&self, ids: &[DocId]) -> StoreResult<u64>;

    /// Removes documents whose id is in `ids`, returning how many were removed.
    fn remove_in(&self, ids: &[DocId]) -> StoreResult<u64>;

    /// Flushes pending writes to disk.
    fn fsync(&self, mode: FsyncMode) -> StoreResult<()>;
}
