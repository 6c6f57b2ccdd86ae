//! Search index backend.

use crate::backend::{DocBackend, FinalizeOnce};
use crate::chunk::{checked_chunks, sum_chunks};
use crate::error::{BackendError, BackendResult};
use crate::options::{
    BackendKind, BackendOptions, DEFAULT_SCROLL_KEEPALIVE, DEFAULT_SCROLL_STEP,
};
use crate::report::BatchReport;
use docsync_store::{
    BulkItem, DocId, Document, Fields, Hit, IndexConnector, SearchIndex, WriteFailure,
};
use serde_json::Value;
use std::fmt;
use std::slice::Chunks;
use std::sync::Arc;
use std::vec;
use tracing::{debug, info, warn};

/// Paging parameters of a scrolling query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollOptions {
    /// Hits per page.
    pub step: usize,
    /// Cursor lifetime, in the store's duration syntax.
    pub keep_alive: String,
    /// Yield stored sources rather than `{_id, _index, _score}` metadata.
    pub only_source: bool,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            step: DEFAULT_SCROLL_STEP,
            keep_alive: DEFAULT_SCROLL_KEEPALIVE.to_string(),
            only_source: true,
        }
    }
}

impl ScrollOptions {
    /// Sets the page size.
    #[must_use]
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Sets the cursor lifetime.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    /// Selects source or metadata output.
    #[must_use]
    pub fn with_only_source(mut self, only_source: bool) -> Self {
        self.only_source = only_source;
        self
    }
}

fn hit_to_document(hit: Hit, only_source: bool) -> Document {
    if only_source {
        return Document::with_fields(hit.id, hit.source);
    }
    let mut meta = Fields::new();
    meta.insert("_index".to_string(), Value::String(hit.index));
    meta.insert(
        "_score".to_string(),
        hit.score.map_or(Value::Null, Value::from),
    );
    Document::with_fields(hit.id, meta)
}

/// Lazy multi-get over a search index, one request per chunk of ids.
///
/// Returned by [`SearchIndexBackend::mget_from_ids`]. A failed request is
/// yielded as an error and ends the iteration.
pub struct MgetIter<'a> {
    index: Arc<dyn SearchIndex>,
    chunks: Chunks<'a, DocId>,
    pending: vec::IntoIter<Hit>,
    only_source: bool,
    failed: bool,
}

impl Iterator for MgetIter<'_> {
    type Item = BackendResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.pending.next() {
                return Some(Ok(hit_to_document(hit, self.only_source)));
            }
            if self.failed {
                return None;
            }
            let chunk = self.chunks.next()?;
            match self.index.get_docs(chunk) {
                Ok(hits) => self.pending = hits.into_iter(),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

impl fmt::Debug for MgetIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MgetIter")
            .field("index", &self.index.index_name())
            .field("pending", &self.pending.len())
            .field("failed", &self.failed)
            .finish()
    }
}

/// Lazy, resumable result feed of a scrolling query.
///
/// Pages are fetched through the scroll cursor as the feed is consumed. A
/// failed page is yielded once as an error, then the feed ends. The cursor
/// is released when the feed is exhausted or dropped.
pub struct DocFeed {
    index: Arc<dyn SearchIndex>,
    cursor: Option<String>,
    pending: vec::IntoIter<Hit>,
    keep_alive: String,
    only_source: bool,
    done: bool,
}

impl DocFeed {
    fn new(index: Arc<dyn SearchIndex>, cursor: Option<String>, hits: Vec<Hit>, options: &ScrollOptions) -> Self {
        let empty = hits.is_empty();
        let mut feed = Self {
            index,
            cursor,
            pending: hits.into_iter(),
            keep_alive: options.keep_alive.clone(),
            only_source: options.only_source,
            done: false,
        };
        if empty {
            feed.finish();
        }
        feed
    }

    /// Returns true while a scroll cursor is held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    fn finish(&mut self) {
        self.done = true;
        if let Some(cursor) = self.cursor.take() {
            if let Err(err) = self.index.clear_scroll(&cursor) {
                debug!(index = %self.index.index_name(), error = %err, "clear scroll failed");
            }
        }
    }
}

impl Iterator for DocFeed {
    type Item = BackendResult<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.pending.next() {
                return Some(Ok(hit_to_document(hit, self.only_source)));
            }
            if self.done {
                return None;
            }
            let Some(cursor) = self.cursor.clone() else {
                self.done = true;
                return None;
            };
            match self.index.scroll(&cursor, &self.keep_alive) {
                Ok(page) if page.hits.is_empty() => {
                    self.finish();
                    return None;
                }
                Ok(page) => {
                    if page.cursor.is_some() {
                        self.cursor = page.cursor;
                    }
                    self.pending = page.hits.into_iter();
                }
                Err(err) => {
                    warn!(index = %self.index.index_name(), error = %err, "scroll failed");
                    self.finish();
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

impl Drop for DocFeed {
    fn drop(&mut self) {
        self.finish();
    }
}

impl fmt::Debug for DocFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocFeed")
            .field("index", &self.index.index_name())
            .field("cursor", &self.cursor)
            .field("pending", &self.pending.len())
            .field("done", &self.done)
            .finish()
    }
}

/// A backend over one document type of a search index.
///
/// Writes follow index semantics: re-adding an id replaces the document, and
/// partial updates are queued until [`DocBackend::finalize`] flushes them.
///
/// # Example
///
/// ```rust
/// use docsync_core::{BackendKind, BackendOptions, DocBackend, ScrollOptions, SearchIndexBackend};
/// use docsync_store::{Document, memory::InMemoryConnector};
///
/// let options = BackendOptions::new(BackendKind::SearchIndex)
///     .index_name("genedoc")
///     .host("localhost:9200")
///     .doc_type("gene");
/// let mut backend = SearchIndexBackend::from_options(&options, &InMemoryConnector::new()).unwrap();
/// backend.prepare().unwrap();
/// backend.insert(vec![Document::new("1017")]).unwrap();
///
/// let ids: Vec<String> = backend
///     .query(None, &ScrollOptions::default())
///     .unwrap()
///     .map(|doc| doc.unwrap().id().to_string())
///     .collect();
/// assert_eq!(ids, vec!["1017"]);
/// ```
pub struct SearchIndexBackend {
    name: String,
    index: Arc<dyn SearchIndex>,
    finalized: FinalizeOnce,
}

impl SearchIndexBackend {
    /// Creates a backend over an open index handle.
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self {
            name: index.index_name().to_string(),
            index,
            finalized: FinalizeOnce::default(),
        }
    }

    /// Validates `options` and connects through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Configuration`] if the options are not for a
    /// search index or lack `index_name`, `host` or `doc_type`, and
    /// [`BackendError::DependencyUnavailable`] if the connection fails.
    pub fn from_options(options: &BackendOptions, connector: &dyn IndexConnector) -> BackendResult<Self> {
        if options.kind != BackendKind::SearchIndex {
            return Err(BackendError::configuration(format!(
                "options are for a {} backend, not search_index",
                options.kind
            )));
        }
        options.validate()?;
        let index = connector
            .connect_index(
                options.require("host")?,
                options.require("index_name")?,
                options.require("doc_type")?,
            )
            .map_err(|e| BackendError::dependency_unavailable(e.to_string()))?;
        Ok(Self::new(index))
    }

    /// Returns the index handle.
    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// Creates the index if needed and verifies its mapping, replacing the
    /// mapping when `update_mapping` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn prepare_with(&mut self, update_mapping: bool) -> BackendResult<()> {
        self.index.create_index()?;
        self.index.verify_mapping(update_mapping)?;
        info!(backend = %self.name, doc_type = %self.index.doc_type(), update_mapping, "index prepared");
        Ok(())
    }

    /// Returns the number of documents in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn count(&self) -> BackendResult<u64> {
        Ok(self.index.count()?)
    }

    /// Multi-gets documents, `step` ids per request, fetched lazily.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidOperation`] for a zero step.
    pub fn mget_from_ids<'a>(&self, ids: &'a [DocId], step: usize, only_source: bool) -> BackendResult<MgetIter<'a>> {
        Ok(MgetIter {
            index: Arc::clone(&self.index),
            chunks: checked_chunks(ids, step)?,
            pending: Vec::new().into_iter(),
            only_source,
            failed: false,
        })
    }

    /// Deletes documents by id, `step` ids per request.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidOperation`] for a zero step, or the
    /// first store error.
    pub fn remove_from_ids(&self, ids: &[DocId], step: usize) -> BackendResult<u64> {
        sum_chunks(ids, step, "remove", |chunk| Ok(self.index.delete_docs(chunk)?))
    }

    /// Runs a scrolling query. `None` matches every document.
    ///
    /// The first page is fetched before returning, so a failing query is an
    /// `Err` here (and is logged); later pages are fetched as the feed is
    /// consumed.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidOperation`] for a zero step, or the
    /// store's error for the first page.
    pub fn query(&self, query: Option<&Value>, options: &ScrollOptions) -> BackendResult<DocFeed> {
        if options.step == 0 {
            return Err(BackendError::invalid_operation("scroll step must be positive"));
        }
        let page = self
            .index
            .search(query, options.step, &options.keep_alive)
            .map_err(|err| {
                warn!(backend = %self.name, error = %err, "query failed");
                BackendError::from(err)
            })?;
        Ok(DocFeed::new(Arc::clone(&self.index), page.cursor, page.hits, options))
    }
}

impl DocBackend for SearchIndexBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::SearchIndex
    }

    fn prepare(&mut self) -> BackendResult<()> {
        self.prepare_with(true)
    }

    fn insert(&mut self, docs: Vec<Document>) -> BackendResult<BatchReport> {
        if docs.is_empty() {
            return Ok(BatchReport::new());
        }
        let mut report = BatchReport::new();
        tally_items(&mut report, self.index.add_docs(docs)?);
        if !report.is_clean() {
            report.log_summary(&self.name);
        }
        Ok(report)
    }

    /// Queues the patch and counts it as affected. Whether the document
    /// existed is only known at `finalize`, which reports queued patches
    /// for absent ids as failures.
    fn update(&mut self, id: &str, patch: Fields) -> BackendResult<u64> {
        self.index.update(id, patch, true)?;
        Ok(1)
    }

    fn drop_all(&mut self) -> BackendResult<()> {
        let dropped = match self.index.get_mapping() {
            Ok(_) => self.index.delete_mapping(),
            Err(err) => Err(err),
        };
        match dropped {
            Ok(()) => {
                info!(backend = %self.name, doc_type = %self.index.doc_type(), "mapping deleted");
                Ok(())
            }
            Err(err) if err.is_missing() => {
                debug!(backend = %self.name, error = %err, "nothing to drop");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_id_list(&self) -> BackendResult<Vec<DocId>> {
        Ok(self.index.get_id_list()?)
    }

    fn get_from_id(&self, id: &str) -> BackendResult<Document> {
        self.index
            .get(id)?
            .map(|hit| hit_to_document(hit, true))
            .ok_or_else(|| BackendError::not_found(id))
    }

    fn finalize(&mut self) -> BackendResult<Option<BatchReport>> {
        self.finalized.check(&self.name)?;
        let mut applied = self.index.flush()?;
        applied.extend(self.index.refresh()?);
        self.index.optimize()?;
        self.finalized.mark();
        info!(backend = %self.name, queued = applied.len(), "index flushed, refreshed and optimized");

        if applied.is_empty() {
            return Ok(None);
        }
        let mut report = BatchReport::new();
        tally_items(&mut report, applied);
        if !report.is_clean() {
            report.log_summary(&self.name);
        }
        Ok(Some(report))
    }
}

fn tally_items(report: &mut BatchReport, items: Vec<BulkItem>) {
    for item in items {
        match item.error {
            None => report.record_success(),
            Some(reason) => report.record_failure(WriteFailure::new(item.id, reason)),
        }
    }
}

impl fmt::Debug for SearchIndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndexBackend")
            .field("name", &self.name)
            .field("doc_type", &self.index.doc_type())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_store::memory::{InMemoryConnector, InMemorySearchIndex};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn setup() -> (Arc<InMemorySearchIndex>, SearchIndexBackend) {
        let index = Arc::new(InMemorySearchIndex::new("genedoc", "gene"));
        let mut backend = SearchIndexBackend::new(index.clone());
        backend.prepare().unwrap();
        (index, backend)
    }

    fn seeded(n: usize) -> (Arc<InMemorySearchIndex>, SearchIndexBackend) {
        let (index, mut backend) = setup();
        let docs = (0..n)
            .map(|i| doc(json!({"_id": format!("d{i}"), "n": i, "even": i % 2 == 0})))
            .collect();
        backend.insert(docs).unwrap();
        (index, backend)
    }

    #[test]
    fn from_options_validates_first() {
        let connector = InMemoryConnector::new();
        let options = BackendOptions::new(BackendKind::SearchIndex).host("h");
        assert!(matches!(
            SearchIndexBackend::from_options(&options, &connector),
            Err(BackendError::Configuration { .. })
        ));
        assert_eq!(connector.connection_count(), 0);

        let options = BackendOptions::new(BackendKind::Memory);
        assert!(SearchIndexBackend::from_options(&options, &connector).is_err());
    }

    #[test]
    fn from_options_refused_connection() {
        let connector = InMemoryConnector::new();
        connector.set_refuse_connections(true);
        let options = BackendOptions::new(BackendKind::SearchIndex)
            .index_name("i")
            .host("h")
            .doc_type("t");
        assert!(matches!(
            SearchIndexBackend::from_options(&options, &connector),
            Err(BackendError::DependencyUnavailable { .. })
        ));
    }

    #[test]
    fn insert_is_upsert() {
        let (_, mut backend) = setup();
        backend.insert(vec![doc(json!({"_id": "a", "v": 1}))]).unwrap();
        let report = backend.insert(vec![doc(json!({"_id": "a", "v": 2}))]).unwrap();
        assert!(report.is_clean());
        assert_eq!(backend.count().unwrap(), 1);
        assert_eq!(backend.get_from_id("a").unwrap().get("v"), Some(&json!(2)));
    }

    #[test]
    fn update_is_queued_until_finalize() {
        let (index, mut backend) = seeded(1);
        assert_eq!(backend.update("d0", fields(json!({"v": "new"}))).unwrap(), 1);
        assert_eq!(index.queued_updates(), 1);
        assert_eq!(backend.get_from_id("d0").unwrap().get("v"), None);

        let report = backend.finalize().unwrap().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.succeeded, 1);
        assert_eq!(backend.get_from_id("d0").unwrap().get("v"), Some(&json!("new")));
        assert_eq!(index.calls().count("optimize"), 1);
    }

    #[test]
    fn queued_update_of_absent_id_fails_at_finalize() {
        let (_, mut backend) = seeded(1);
        backend.update("d0", fields(json!({"v": "new"}))).unwrap();
        backend.update("ghost", fields(json!({"v": "new"}))).unwrap();

        let report = backend.finalize().unwrap().unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].id.as_deref(), Some("ghost"));
        assert!(backend.get_from_id("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn finalize_without_queued_updates_reports_nothing() {
        let (_, mut backend) = seeded(2);
        assert_eq!(backend.finalize().unwrap(), None);
    }

    #[test]
    fn drop_missing_mapping_is_noop() {
        let index = Arc::new(InMemorySearchIndex::new("absent", "gene"));
        let mut backend = SearchIndexBackend::new(index.clone());
        backend.drop_all().unwrap();
        assert_eq!(index.calls().count("delete_mapping"), 0);
    }

    #[test]
    fn drop_removes_mapping_and_documents() {
        let (index, mut backend) = seeded(3);
        backend.drop_all().unwrap();
        assert_eq!(index.calls().count("delete_mapping"), 1);
        assert!(backend.get_id_list().unwrap().is_empty());
        backend.drop_all().unwrap();
    }

    #[test]
    fn drop_propagates_outage() {
        let (index, mut backend) = setup();
        index.set_unavailable(true);
        assert!(matches!(
            backend.drop_all(),
            Err(BackendError::DependencyUnavailable { .. })
        ));
    }

    #[test]
    fn get_from_id_missing_is_not_found() {
        let (_, backend) = setup();
        assert!(backend.get_from_id("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn mget_is_chunked_and_lazy() {
        let (index, backend) = seeded(5);
        index.calls().reset();
        let ids: Vec<DocId> = vec!["d4".into(), "d0".into(), "zz".into(), "d2".into(), "d1".into()];

        let mut iter = backend.mget_from_ids(&ids, 2, true).unwrap();
        assert_eq!(index.calls().count("get_docs"), 0);
        assert_eq!(iter.next().unwrap().unwrap().id(), "d4");
        let rest: Vec<String> = iter.map(|d| d.unwrap().id().to_string()).collect();
        assert_eq!(rest, vec!["d0", "d2", "d1"]);
        assert_eq!(index.calls().count("get_docs"), 3);
    }

    #[test]
    fn mget_metadata_only() {
        let (_, backend) = seeded(1);
        let ids: Vec<DocId> = vec!["d0".into()];
        let docs: Vec<Document> = backend
            .mget_from_ids(&ids, 10, false)
            .unwrap()
            .collect::<BackendResult<_>>()
            .unwrap();
        assert_eq!(docs[0].get("_index"), Some(&json!("genedoc")));
        assert!(!docs[0].contains_key("n"));
    }

    #[test]
    fn remove_is_chunked() {
        let (index, backend) = seeded(5);
        index.calls().reset();
        let ids: Vec<DocId> = (0..5).map(|i| format!("d{i}")).collect();
        assert_eq!(backend.remove_from_ids(&ids, 2).unwrap(), 5);
        assert_eq!(index.calls().count("delete_docs"), 3);
    }

    #[test]
    fn query_pages_through_scroll() {
        let (index, backend) = seeded(5);
        let options = ScrollOptions::default().with_step(2);
        let feed = backend.query(None, &options).unwrap();
        let ids: Vec<String> = feed.map(|d| d.unwrap().id().to_string()).collect();
        assert_eq!(ids, vec!["d0", "d1", "d2", "d3", "d4"]);
        assert_eq!(index.calls().count("scroll"), 3);
        assert_eq!(index.open_scrolls(), 0);
    }

    #[test]
    fn query_with_term_filter() {
        let (_, backend) = seeded(5);
        let query = json!({"term": {"even": true}});
        let ids: Vec<String> = backend
            .query(Some(&query), &ScrollOptions::default())
            .unwrap()
            .map(|d| d.unwrap().id().to_string())
            .collect();
        assert_eq!(ids, vec!["d0", "d2", "d4"]);
    }

    #[test]
    fn query_failure_is_observable() {
        let (_, backend) = seeded(2);
        let query = json!({"bogus": {}});
        assert!(backend.query(Some(&query), &ScrollOptions::default()).is_err());
        assert!(matches!(
            backend.query(None, &ScrollOptions::default().with_step(0)),
            Err(BackendError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn later_page_failure_ends_feed() {
        let (index, backend) = seeded(4);
        let mut feed = backend.query(None, &ScrollOptions::default().with_step(2)).unwrap();
        assert!(feed.next().unwrap().is_ok());
        assert!(feed.next().unwrap().is_ok());
        index.set_unavailable(true);
        assert!(feed.next().unwrap().is_err());
        assert!(feed.next().is_none());
    }

    #[test]
    fn dropped_feed_clears_scroll() {
        let (index, backend) = seeded(4);
        let mut feed = backend.query(None, &ScrollOptions::default().with_step(2)).unwrap();
        feed.next();
        assert!(feed.is_open());
        assert_eq!(index.open_scrolls(), 1);
        drop(feed);
        assert_eq!(index.open_scrolls(), 0);
    }

    #[test]
    fn query_metadata_only() {
        let (_, backend) = seeded(1);
        let options = ScrollOptions::default().with_only_source(false);
        let docs: Vec<Document> = backend
            .query(None, &options)
            .unwrap()
            .collect::<BackendResult<_>>()
            .unwrap();
        assert_eq!(
            docs[0].clone().into_value(),
            json!({"_id": "d0", "_index": "genedoc", "_score": 1.0})
        );
    }

    #[test]
    fn finalize_runs_once() {
        let (_, mut backend) = setup();
        backend.finalize().unwrap();
        assert!(matches!(
            backend.finalize(),
            Err(BackendError::AlreadyFinalized { .. })
        ));
    }
}
