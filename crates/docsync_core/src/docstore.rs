//! Document database backend.

use crate::backend::{DocBackend, FinalizeOnce};
use crate::chunk::{checked_chunks, sum_chunks};
use crate::diff::Diff;
use crate::error::{BackendError, BackendResult};
use crate::handle::LazyHandle;
use crate::options::{BackendKind, DEFAULT_MGET_STEP};
use crate::report::BatchReport;
use docsync_store::{
    DocId, Document, DocumentCollection, Fields, FsyncMode, SetOp, StoreError, WriteFailure,
    ID_FIELD,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A backend over one document database collection.
///
/// The collection handle may be supplied up front or as a provider that is
/// only called on first use; see [`LazyHandle`].
///
/// ## Extensions
///
/// - [`update_many`](Self::update_many) - ordered bulk `$set`, optional upsert
/// - [`update_diff`](Self::update_diff) - apply a [`Diff`] as `$set`/`$unset`
/// - [`mget_from_ids`](Self::mget_from_ids) / [`mget_iter`](Self::mget_iter) -
///   multi-get in input order
/// - [`count_from_ids`](Self::count_from_ids) /
///   [`remove_from_ids`](Self::remove_from_ids) - chunked `$in` queries
///
/// ## Insert failures
///
/// `insert` is a single insert-many. Store failures (including a duplicate
/// key, which rejects the whole batch) never abort the caller: they are
/// logged and returned in the [`BatchReport`].
pub struct DocumentStoreBackend {
    name: String,
    collection: LazyHandle<dyn DocumentCollection>,
    fsync_mode: FsyncMode,
    mget_step: usize,
    finalized: FinalizeOnce,
}

impl DocumentStoreBackend {
    /// Creates a backend over an open collection.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        let name = collection.name().to_string();
        Self::with_handle(name, LazyHandle::resolved(collection))
    }

    /// Creates a backend whose collection is opened by `provider` on first use.
    pub fn deferred<F>(name: impl Into<String>, provider: F) -> Self
    where
        F: Fn() -> BackendResult<Arc<dyn DocumentCollection>> + Send + Sync + 'static,
    {
        Self::with_handle(name.into(), LazyHandle::deferred(provider))
    }

    fn with_handle(name: String, collection: LazyHandle<dyn DocumentCollection>) -> Self {
        Self {
            name,
            collection,
            fsync_mode: FsyncMode::default(),
            mget_step: DEFAULT_MGET_STEP,
            finalized: FinalizeOnce::default(),
        }
    }

    /// Sets the durability flush mode used by `finalize`.
    #[must_use]
    pub fn with_fsync_mode(mut self, mode: FsyncMode) -> Self {
        self.fsync_mode = mode;
        self
    }

    /// Sets the number of ids per multi-get request.
    #[must_use]
    pub fn with_mget_step(mut self, step: usize) -> Self {
        self.mget_step = step;
        self
    }

    /// Returns the collection, opening it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DependencyUnavailable`] if it cannot be opened.
    pub fn collection(&self) -> BackendResult<Arc<dyn DocumentCollection>> {
        self.collection.get()
    }

    /// Returns true once the collection has been opened.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.collection.is_resolved()
    }

    /// Returns the number of documents in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn count(&self) -> BackendResult<u64> {
        Ok(self.collection()?.count()?)
    }

    /// Overwrites fields of each document by id, in order.
    ///
    /// Without `upsert`, documents whose id is not stored are skipped.
    /// Returns matched plus upserted documents; insert and delete counts of
    /// the bulk result are not included.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_many(&self, docs: Vec<Document>, upsert: bool) -> BackendResult<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        let ops: Vec<SetOp> = docs
            .into_iter()
            .map(|doc| {
                let id = doc.id().to_string();
                let mut set = doc.into_fields();
                set.remove(ID_FIELD);
                SetOp { id, set, upsert }
            })
            .collect();
        let result = self.collection()?.bulk_set(ops)?;
        debug!(
            backend = %self.name,
            matched = result.matched,
            modified = result.modified,
            upserted = result.upserted,
            "bulk set"
        );
        Ok(result.matched + result.upserted)
    }

    /// Applies `diff` (plus the common fields in `extra`) to its target.
    ///
    /// Never upserts. Returns the number of modified documents (0 or 1). A
    /// no-op diff with no extra fields sends nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn update_diff(&self, diff: &Diff, extra: &Fields) -> BackendResult<u64> {
        let spec = diff.to_update_spec(extra);
        if spec.is_empty() {
            return Ok(0);
        }
        let result = self.collection()?.update_one(&diff.id, spec, false)?;
        Ok(result.modified)
    }

    /// Fetches documents by id, in the order of `ids`.
    ///
    /// Ids with no document are omitted; repeated ids are repeated.
    ///
    /// # Errors
    ///
    /// Returns the first store error; nothing is returned on failure.
    pub fn mget_from_ids(&self, ids: &[DocId]) -> BackendResult<Vec<Document>> {
        self.mget_iter(ids)?.collect()
    }

    /// Lazy form of [`mget_from_ids`](Self::mget_from_ids).
    ///
    /// One multi-get request is issued per chunk of ids, when the iterator
    /// reaches it. A failed request is yielded as an error and ends the
    /// iteration.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be opened or the configured
    /// step is zero.
    pub fn mget_iter<'a>(
        &self,
        ids: &'a [DocId],
    ) -> BackendResult<impl Iterator<Item = BackendResult<Document>> + 'a> {
        let collection = self.collection()?;
        let mut chunks = checked_chunks(ids, self.mget_step)?;
        let mut pending = Vec::new().into_iter();
        let mut failed = false;

        Ok(std::iter::from_fn(move || loop {
            if let Some(doc) = pending.next() {
                return Some(Ok(doc));
            }
            if failed {
                return None;
            }
            let chunk = chunks.next()?;
            match collection.find_in(chunk) {
                Ok(found) => pending = in_request_order(chunk, found).into_iter(),
                Err(err) => {
                    failed = true;
                    return Some(Err(err.into()));
                }
            }
        }))
    }

    /// Counts stored documents among `ids`, `step` ids per query.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidOperation`] for a zero step, or the
    /// first store error.
    pub fn count_from_ids(&self, ids: &[DocId], step: usize) -> BackendResult<u64> {
        let collection = self.collection()?;
        sum_chunks(ids, step, "count", |chunk| Ok(collection.count_in(chunk)?))
    }

    /// Removes documents by id, `step` ids per request.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidOperation`] for a zero step, or the
    /// first store error. Chunks before the failed one stay removed.
    pub fn remove_from_ids(&self, ids: &[DocId], step: usize) -> BackendResult<u64> {
        let collection = self.collection()?;
        let removed = sum_chunks(ids, step, "remove", |chunk| {
            Ok(collection.remove_in(chunk)?)
        })?;
        info!(backend = %self.name, removed, "removed documents");
        Ok(removed)
    }

    fn insert_report(total: u64, err: StoreError) -> BatchReport {
        match err {
            StoreError::BulkWrite { written, failures } => {
                let mut report = BatchReport::all_succeeded(written);
                let failed = total.saturating_sub(written);
                report.failed = failed;
                report.failures = failures;
                if report.failures.is_empty() && failed > 0 {
                    report
                        .failures
                        .push(WriteFailure::unattributed("bulk write error"));
                }
                report
            }
            other => BatchReport::batch_failed(total, other.to_string()),
        }
    }
}

fn in_request_order(ids: &[DocId], found: Vec<Document>) -> Vec<Document> {
    let by_id: HashMap<String, Document> = found
        .into_iter()
        .map(|doc| (doc.id().to_string(), doc))
        .collect();
    ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
}

impl DocBackend for DocumentStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::DocumentStore
    }

    fn insert(&mut self, docs: Vec<Document>) -> BackendResult<BatchReport> {
        if docs.is_empty() {
            return Ok(BatchReport::new());
        }
        let total = docs.len() as u64;
        let collection = self.collection()?;
        match collection.insert_many(docs) {
            Ok(ids) => Ok(BatchReport::all_succeeded(ids.len() as u64)),
            Err(err) => {
                warn!(backend = %self.name, total, error = %err, "insert failed");
                let report = Self::insert_report(total, err);
                report.log_summary(&self.name);
                Ok(report)
            }
        }
    }

    fn update(&mut self, id: &str, patch: Fields) -> BackendResult<u64> {
        self.update_many(vec![Document::with_fields(id, patch)], false)
    }

    fn drop_all(&mut self) -> BackendResult<()> {
        self.collection()?.drop_collection()?;
        info!(backend = %self.name, "collection dropped");
        Ok(())
    }

    fn get_id_list(&self) -> BackendResult<Vec<DocId>> {
        Ok(self.collection()?.find_ids()?)
    }

    fn get_from_id(&self, id: &str) -> BackendResult<Document> {
        self.collection()?
            .find_one(id)?
            .ok_or_else(|| BackendError::not_found(id))
    }

    fn finalize(&mut self) -> BackendResult<Option<BatchReport>> {
        self.finalized.check(&self.name)?;
        self.collection()?.fsync(self.fsync_mode)?;
        self.finalized.mark();
        info!(backend = %self.name, mode = ?self.fsync_mode, "fsync requested");
        Ok(None)
    }
}

impl std::fmt::Debug for DocumentStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStoreBackend")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .field("fsync_mode", &self.fsync_mode)
            .field("mget_step", &self.mget_step)
            .finish()
    }
}
