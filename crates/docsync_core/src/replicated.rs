//! Replicated document store backend with a buffered write cache.

use crate::backend::{DocBackend, FinalizeOnce};
use crate::error::{BackendError, BackendResult};
use crate::options::{BackendKind, DEFAULT_UPLOAD_STEP};
use crate::postprocess::{DocPostProcessor, HomologeneTrim};
use crate::report::BatchReport;
use docsync_store::{DocId, Document, Fields, ReplicaDb, ReplicaServer, StoreError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// How the write cache is populated on first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheLoad {
    /// The first `update` reads the whole database into memory.
    ///
    /// Memory use grows with the database; there is no size guard.
    #[default]
    Eager,
    /// Each id is read from the database the first time it is updated.
    OnDemand,
}

/// Write buffer of the replicated backend, keyed by id.
///
/// Lifecycle: empty at construction, populated on first update, mutated by
/// later updates, cleared after a flush. While documents sit here the
/// database still holds their previous version.
#[derive(Debug, Default)]
pub struct DocCache {
    docs: BTreeMap<DocId, Document>,
    loaded: bool,
}

impl DocCache {
    /// Creates an empty, unloaded cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of buffered documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Returns true once a full load has happened.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Returns a buffered document.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    /// Returns true if `id` is buffered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.docs.contains_key(id)
    }

    /// Iterates over buffered documents in id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.docs.get_mut(id)
    }

    fn put(&mut self, doc: Document) {
        self.docs.insert(doc.id().to_string(), doc);
    }

    fn load(&mut self, docs: Vec<Document>) {
        for doc in docs {
            self.put(doc);
        }
        self.loaded = true;
    }

    fn clear(&mut self) {
        self.docs.clear();
        self.loaded = false;
    }
}

fn open_or_create(server: &dyn ReplicaServer, name: &str) -> BackendResult<Arc<dyn ReplicaDb>> {
    match server.open(name) {
        Ok(db) => Ok(db),
        Err(err) if err.is_missing() => match server.create(name) {
            Ok(db) => {
                info!(db = name, "database created");
                Ok(db)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(db = name, "database created concurrently, reopening");
                Ok(server.open(name)?)
            }
            Err(err) => Err(err.into()),
        },
        Err(err) => Err(err.into()),
    }
}

/// A backend over one database of a replicated document store.
///
/// `insert` writes straight through. `update` is buffered: it merges into the
/// [`DocCache`] and nothing reaches the database until [`flush`](Self::flush)
/// or [`DocBackend::finalize`]. Until then `get_from_id` and `get_id_list`,
/// which read the database, return the pre-update state. Inserting an id that
/// is already buffered replaces the buffered copy with the newly stored one.
///
/// Before upload every buffered document passes through the post-processor
/// chain, by default `[HomologeneTrim::default()]`.
///
/// # Example
///
/// ```rust
/// use docsync_core::{DocBackend, ReplicatedStoreBackend};
/// use docsync_store::{Document, memory::InMemoryReplicaServer};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let server = Arc::new(InMemoryReplicaServer::new());
/// let mut backend = ReplicatedStoreBackend::open(server, "genes").unwrap();
/// backend.insert(vec![Document::new("1017")]).unwrap();
///
/// let patch = json!({"symbol": "CDK2"}).as_object().unwrap().clone();
/// backend.update("1017", patch).unwrap();
/// assert!(backend.get_from_id("1017").unwrap().get("symbol").is_none());
///
/// backend.finalize().unwrap();
/// assert!(backend.get_from_id("1017").unwrap().get("symbol").is_some());
/// ```
pub struct ReplicatedStoreBackend {
    name: String,
    server: Arc<dyn ReplicaServer>,
    db: Arc<dyn ReplicaDb>,
    cache: DocCache,
    cache_load: CacheLoad,
    post_processors: Vec<Box<dyn DocPostProcessor>>,
    upload_step: usize,
    dropped: bool,
    finalized: FinalizeOnce,
}

impl ReplicatedStoreBackend {
    /// Opens database `db_name`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database can neither be opened nor created.
    pub fn open(server: Arc<dyn ReplicaServer>, db_name: &str) -> BackendResult<Self> {
        let db = open_or_create(server.as_ref(), db_name)?;
        Ok(Self {
            name: db_name.to_string(),
            server,
            db,
            cache: DocCache::new(),
            cache_load: CacheLoad::default(),
            post_processors: vec![Box::new(HomologeneTrim::default())],
            upload_step: DEFAULT_UPLOAD_STEP,
            dropped: false,
            finalized: FinalizeOnce::default(),
        })
    }

    /// Sets how the cache is populated.
    #[must_use]
    pub fn with_cache_load(mut self, cache_load: CacheLoad) -> Self {
        self.cache_load = cache_load;
        self
    }

    /// Replaces the post-processor chain. An empty chain uploads documents
    /// unchanged.
    #[must_use]
    pub fn with_post_processors(mut self, processors: Vec<Box<dyn DocPostProcessor>>) -> Self {
        self.post_processors = processors;
        self
    }

    /// Sets the number of documents per upload request.
    #[must_use]
    pub fn with_upload_step(mut self, step: usize) -> Self {
        self.upload_step = step;
        self
    }

    /// Returns the database handle.
    pub fn db(&self) -> &Arc<dyn ReplicaDb> {
        &self.db
    }

    /// Returns the write cache.
    pub fn cache(&self) -> &DocCache {
        &self.cache
    }

    /// Returns the number of buffered documents.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true once the whole database has been read into the cache.
    #[must_use]
    pub fn is_cache_loaded(&self) -> bool {
        self.cache.is_loaded()
    }

    /// Recreates the database on the first write after `drop_all`.
    fn reopen_if_dropped(&mut self) -> BackendResult<()> {
        if self.dropped {
            self.db = open_or_create(self.server.as_ref(), &self.name)?;
            self.dropped = false;
            debug!(backend = %self.name, "database recreated after drop");
        }
        Ok(())
    }

    fn ensure_cached(&mut self, id: &str) -> BackendResult<()> {
        match self.cache_load {
            CacheLoad::Eager if !self.cache.is_loaded() => {
                let docs = self.db.all_docs()?;
                info!(backend = %self.name, count = docs.len(), "cache loaded");
                self.cache.load(docs);
            }
            CacheLoad::OnDemand if !self.cache.contains(id) => {
                if let Some(doc) = self.db.get(id)? {
                    self.cache.put(doc);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Uploads the cache and clears it.
    ///
    /// Post-processors run over every buffered document first. Documents are
    /// sent `upload_step` at a time; per-document rejections are tallied in
    /// the report and the most frequent reasons are logged.
    ///
    /// # Errors
    ///
    /// Returns the store error if a whole upload request fails. The cache is
    /// kept in that case, but chunks uploaded before the failure are already
    /// written.
    pub fn flush(&mut self) -> BackendResult<BatchReport> {
        if self.upload_step == 0 {
            return Err(BackendError::invalid_operation("upload step must be positive"));
        }
        self.reopen_if_dropped()?;
        for processor in &self.post_processors {
            let changed = self
                .cache
                .docs
                .values_mut()
                .map(|doc| processor.process(doc))
                .filter(|changed| *changed)
                .count();
            debug!(backend = %self.name, processor = processor.name(), changed, "post-processed");
        }

        let docs: Vec<&Document> = self.cache.documents().collect();
        let mut report = BatchReport::new();
        for chunk in docs.chunks(self.upload_step) {
            let batch: Vec<Document> = chunk.iter().map(|doc| (*doc).clone()).collect();
            report.merge(BatchReport::from_outcomes(self.db.bulk_update(batch)?));
        }
        report.log_summary(&self.name);
        self.cache.clear();
        Ok(report)
    }
}

impl DocBackend for ReplicatedStoreBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::ReplicatedStore
    }

    fn prepare(&mut self) -> BackendResult<()> {
        self.db = open_or_create(self.server.as_ref(), &self.name)?;
        self.dropped = false;
        Ok(())
    }

    fn insert(&mut self, docs: Vec<Document>) -> BackendResult<BatchReport> {
        if docs.is_empty() {
            return Ok(BatchReport::new());
        }
        self.reopen_if_dropped()?;
        let outcomes = self.db.bulk_update(docs)?;
        // Cached copies must carry the store's current revision.
        if self.cache.is_loaded() || !self.cache.is_empty() {
            for outcome in outcomes.iter().filter(|o| o.ok) {
                if self.cache.is_loaded() || self.cache.contains(&outcome.id) {
                    if let Some(doc) = self.db.get(&outcome.id)? {
                        self.cache.put(doc);
                    }
                }
            }
        }
        let report = BatchReport::from_outcomes(outcomes);
        if !report.is_clean() {
            report.log_summary(&self.name);
        }
        Ok(report)
    }

    fn update(&mut self, id: &str, patch: Fields) -> BackendResult<u64> {
        self.reopen_if_dropped()?;
        self.ensure_cached(id)?;
        match self.cache.get_mut(id) {
            Some(doc) => {
                doc.merge(&patch);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn drop_all(&mut self) -> BackendResult<()> {
        self.cache.clear();
        match self.server.delete(&self.name) {
            Ok(()) => info!(backend = %self.name, "database deleted"),
            Err(err) if err.is_missing() => debug!(backend = %self.name, "database already absent"),
            Err(err) => return Err(err.into()),
        }
        self.dropped = true;
        Ok(())
    }

    fn get_id_list(&self) -> BackendResult<Vec<DocId>> {
        if self.dropped {
            return Ok(Vec::new());
        }
        Ok(self.db.all_ids()?)
    }

    fn get_from_id(&self, id: &str) -> BackendResult<Document> {
        if self.dropped {
            return Err(BackendError::not_found(id));
        }
        self.db.get(id)?.ok_or_else(|| BackendError::not_found(id))
    }

    fn finalize(&mut self) -> BackendResult<Option<BatchReport>> {
        self.finalized.check(&self.name)?;
        let report = if self.cache.is_empty() {
            None
        } else {
            Some(self.flush()?)
        };
        if self.dropped {
            debug!(backend = %self.name, "nothing to commit after drop");
        } else {
            self.db.commit()?;
            self.db.compact()?;
            info!(backend = %self.name, "database committed and compacted");
        }
        self.finalized.mark();
        Ok(report)
    }
}

impl fmt::Debug for ReplicatedStoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedStoreBackend")
            .field("name", &self.name)
            .field("cached", &self.cache.len())
            .field("cache_load", &self.cache_load)
            .field("post_processors", &self.post_processors)
            .field("upload_step", &self.upload_step)
            .finish()
    }
}
