//! Search index driver trait.

use crate::document::{DocId, Document, Fields};
use crate::error::StoreResult;
use serde_json::Value;

/// One search or get hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// The document id.
    pub id: DocId,
    /// The index the hit came from.
    pub index: String,
    /// Relevance score, when the request computed one.
    pub score: Option<f64>,
    /// The stored source, without `_id`.
    pub source: Fields,
}

/// One page of a scrolling search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrollPage {
    /// Cursor for the next page; `None` when the store keeps no cursor.
    pub cursor: Option<String>,
    /// The hits on this page. An empty page ends the scroll.
    pub hits: Vec<Hit>,
}

/// Per-document outcome of a bulk add or of applying a queued update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// The document id.
    pub id: DocId,
    /// The rejection reason, if the item failed.
    pub error: Option<String>,
}

/// A handle to one document type of one search index.
///
/// Writes are eventually visible: queued (`bulk`) updates and added documents
/// become searchable after [`SearchIndex::flush`] or [`SearchIndex::refresh`].
pub trait SearchIndex: Send + Sync {
    /// Returns the index name.
    fn index_name(&self) -> &str;

    /// Returns the document type name.
    fn doc_type(&self) -> &str;

    /// Creates the index. Creating an existing index succeeds.
    fn create_index(&self) -> StoreResult<()>;

    /// Checks the field mapping, installing it when absent or when `update` is set.
    fn verify_mapping(&self, update: bool) -> StoreResult<()>;

    /// Returns the number of documents in the index.
    fn count(&self) -> StoreResult<u64>;

    /// Adds or replaces documents, reporting each item's outcome.
    fn add_docs(&self, docs: Vec<Document>) -> StoreResult<Vec<BulkItem>>;

    /// Applies a partial update. With `bulk`, the update is queued until the next flush.
    fn update(&self, id: &str, patch: Fields, bulk: bool) -> StoreResult<()>;

    /// Returns the type mapping.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Missing`] if the index or type is absent.
    fn get_mapping(&self) -> StoreResult<Value>;

    /// Deletes the type mapping and its documents.
    fn delete_mapping(&self) -> StoreResult<()>;

    /// Flushes queued operations, reporting the outcome of each queued update.
    fn flush(&self) -> StoreResult<Vec<BulkItem>>;

    /// Makes recent writes visible to search, reporting the outcome of each
    /// queued update it applied.
    fn refresh(&self) -> StoreResult<Vec<BulkItem>>;

    /// Starts a background segment merge.
    fn optimize(&self) -> StoreResult<()>;

    /// Returns every id in the index.
    fn get_id_list(&self) -> StoreResult<Vec<DocId>>;

    /// Returns one document.
    fn get(&self, id: &str) -> StoreResult<Option<Hit>>;

    /// Multi-get; ids with no document are omitted.
    fn get_docs(&self, ids: &[DocId]) -> StoreResult<Vec<Hit>>;

    /// Deletes documents by id, returning how many were deleted.
    fn delete_docs(&self, ids: &[DocId]) -> StoreResult<u64>;

    /// Opens a scrolling search and returns its first page.
    fn search(&self, query: Option<&Value>, size: usize, keep_alive: &str) -> StoreResult<ScrollPage>;

    /// Returns the next page of an open scroll.
    fn scroll(&self, cursor: &str, keep_alive: &str) -> StoreResult<ScrollPage>;

    /// Releases a scroll cursor. Clearing an unknown cursor succeeds.
    fn clear_scroll(&self, cursor: &str) -> StoreResult<()>;
}
