//! In-memory search index.

use super::CallLog;
use crate::document::{DocId, Document, Fields, ID_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::index::{BulkItem, Hit, ScrollPage, SearchIndex};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
struct IndexState {
    exists: bool,
    mapping: Option<Value>,
    /// Documents visible to readers.
    docs: BTreeMap<DocId, Fields>,
    /// Bulk-queued partial updates, applied on flush or refresh.
    queued: Vec<(DocId, Fields)>,
    /// Open cursors: page size and the hits not yet handed out.
    scrolls: HashMap<String, (usize, Vec<Hit>)>,
}

/// An in-memory search index holding one document type.
///
/// Supported queries are `None`, `{"match_all": {}}` and
/// `{"term": {"<field>": <value>}}`; anything else is rejected, which lets
/// callers observe query failures.
#[derive(Debug)]
pub struct InMemorySearchIndex {
    index_name: String,
    doc_type: String,
    expected_mapping: Value,
    state: RwLock<IndexState>,
    next_cursor: AtomicU64,
    unavailable: AtomicBool,
    calls: CallLog,
}

impl InMemorySearchIndex {
    /// Creates a handle to a not-yet-created index.
    #[must_use]
    pub fn new(index_name: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let doc_type = doc_type.into();
        let mut expected_mapping = Fields::new();
        expected_mapping.insert(doc_type.clone(), json!({ "properties": {} }));
        let expected_mapping = Value::Object(expected_mapping);
        Self {
            index_name: index_name.into(),
            doc_type,
            expected_mapping,
            state: RwLock::new(IndexState::default()),
            next_cursor: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
            calls: CallLog::default(),
        }
    }

    /// Sets the mapping installed by [`SearchIndex::verify_mapping`].
    #[must_use]
    pub fn with_expected_mapping(mut self, mapping: Value) -> Self {
        self.expected_mapping = mapping;
        self
    }

    /// Makes every primitive fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the call log.
    #[must_use]
    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    /// Returns the number of queued partial updates.
    #[must_use]
    pub fn queued_updates(&self) -> usize {
        self.state.read().queued.len()
    }

    /// Returns the number of open scroll cursors.
    #[must_use]
    pub fn open_scrolls(&self) -> usize {
        self.state.read().scrolls.len()
    }

    /// Returns true if the index has been created.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.state.read().exists
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        self.calls.record(op);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "index {} is unreachable",
                self.index_name
            )));
        }
        Ok(())
    }

    fn hit(&self, id: &str, source: &Fields, score: Option<f64>) -> Hit {
        Hit {
            id: id.to_string(),
            index: self.index_name.clone(),
            score,
            source: source.clone(),
        }
    }

    fn apply_queued(state: &mut IndexState) -> Vec<BulkItem> {
        std::mem::take(&mut state.queued)
            .into_iter()
            .map(|(id, patch)| match state.docs.get_mut(&id) {
                Some(source) => {
                    for (key, value) in patch {
                        if key != ID_FIELD {
                            source.insert(key, value);
                        }
                    }
                    BulkItem { id, error: None }
                }
                None => BulkItem {
                    id,
                    error: Some("document_missing_exception".to_string()),
                },
            })
            .collect()
    }

    fn matches(query: Option<&Value>, source: &Fields) -> StoreResult<bool> {
        let Some(query) = query else {
            return Ok(true);
        };
        if query.get("match_all").is_some() {
            return Ok(true);
        }
        if let Some(Value::Object(term)) = query.get("term") {
            return Ok(term
                .iter()
                .all(|(field, expected)| source.get(field) == Some(expected)));
        }
        Err(StoreError::Other(format!("unsupported query: {query}")))
    }
}

impl SearchIndex for InMemorySearchIndex {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    fn doc_type(&self) -> &str {
        &self.doc_type
    }

    fn create_index(&self) -> StoreResult<()> {
        self.enter("create_index")?;
        self.state.write().exists = true;
        Ok(())
    }

    fn verify_mapping(&self, update: bool) -> StoreResult<()> {
        self.enter("verify_mapping")?;
        let mut state = self.state.write();
        if !state.exists {
            return Err(StoreError::missing(format!("index {}", self.index_name)));
        }
        if update || state.mapping.is_none() {
            state.mapping = Some(self.expected_mapping.clone());
        }
        Ok(())
    }

    fn count(&self) -> StoreResult<u64> {
        self.enter("count")?;
        Ok(self.state.read().docs.len() as u64)
    }

    fn add_docs(&self, docs: Vec<Document>) -> StoreResult<Vec<BulkItem>> {
        self.enter("add_docs")?;
        let mut state = self.state.write();
        // Adding documents creates the index and a dynamic mapping on demand.
        state.exists = true;
        if state.mapping.is_none() {
            state.mapping = Some(self.expected_mapping.clone());
        }

        let items = docs
            .into_iter()
            .map(|doc| {
                let id = doc.id().to_string();
                let mut source = doc.into_fields();
                source.remove(ID_FIELD);
                state.docs.insert(id.clone(), source);
                BulkItem { id, error: None }
            })
            .collect();
        Ok(items)
    }

    fn update(&self, id: &str, patch: Fields, bulk: bool) -> StoreResult<()> {
        self.enter("update")?;
        let mut state = self.state.write();
        if bulk {
            state.queued.push((id.to_string(), patch));
            return Ok(());
        }
        let Some(source) = state.docs.get_mut(id) else {
            return Err(StoreError::missing(format!("document {id}")));
        };
        for (key, value) in patch {
            if key != ID_FIELD {
                source.insert(key, value);
            }
        }
        Ok(())
    }

    fn get_mapping(&self) -> StoreResult<Value> {
        self.enter("get_mapping")?;
        let state = self.state.read();
        match (&state.mapping, state.exists) {
            (Some(mapping), true) => Ok(mapping.clone()),
            (_, false) => Err(StoreError::missing(format!("index {}", self.index_name))),
            (None, true) => Err(StoreError::missing(format!("type {}", self.doc_type))),
        }
    }

    fn delete_mapping(&self) -> StoreResult<()> {
        self.enter("delete_mapping")?;
        let mut state = self.state.write();
        if state.mapping.take().is_none() {
            return Err(StoreError::missing(format!("type {}", self.doc_type)));
        }
        state.docs.clear();
        state.queued.clear();
        Ok(())
    }

    fn flush(&self) -> StoreResult<Vec<BulkItem>> {
        self.enter("flush")?;
        Ok(Self::apply_queued(&mut self.state.write()))
    }

    fn refresh(&self) -> StoreResult<Vec<BulkItem>> {
        self.enter("refresh")?;
        Ok(Self::apply_queued(&mut self.state.write()))
    }

    fn optimize(&self) -> StoreResult<()> {
        self.enter("optimize")
    }

    fn get_id_list(&self) -> StoreResult<Vec<DocId>> {
        self.enter("get_id_list")?;
        Ok(self.state.read().docs.keys().cloned().collect())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Hit>> {
        self.enter("get")?;
        let state = self.state.read();
        Ok(state.docs.get(id).map(|source| self.hit(id, source, None)))
    }

    fn get_docs(&self, ids: &[DocId]) -> StoreResult<Vec<Hit>> {
        self.enter("get_docs")?;
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.docs.get(id).map(|source| self.hit(id, source, None)))
            .collect())
    }

    fn delete_docs(&self, ids: &[DocId]) -> StoreResult<u64> {
        self.enter("delete_docs")?;
        let mut state = self.state.write();
        let unique: HashSet<&DocId> = ids.iter().collect();
        let deleted = unique
            .into_iter()
            .filter(|id| state.docs.remove(*id).is_some())
            .count();
        Ok(deleted as u64)
    }

    fn search(&self, query: Option<&Value>, size: usize, _keep_alive: &str) -> StoreResult<ScrollPage> {
        self.enter("search")?;
        let mut state = self.state.write();
        if !state.exists {
            return Err(StoreError::missing(format!("index {}", self.index_name)));
        }

        let mut hits = Vec::new();
        for (id, source) in &state.docs {
            if Self::matches(query, source)? {
                hits.push(self.hit(id, source, Some(1.0)));
            }
        }

        let size = size.max(1);
        let rest = hits.split_off(size.min(hits.len()));
        let cursor = format!("scroll-{}", self.next_cursor.fetch_add(1, Ordering::SeqCst));
        state.scrolls.insert(cursor.clone(), (size, rest));
        Ok(ScrollPage {
            cursor: Some(cursor),
            hits,
        })
    }

    fn scroll(&self, cursor: &str, _keep_alive: &str) -> StoreResult<ScrollPage> {
        self.enter("scroll")?;
        let mut state = self.state.write();
        let Some((size, remaining)) = state.scrolls.get_mut(cursor) else {
            return Err(StoreError::missing(format!("scroll {cursor}")));
        };
        let take = (*size).min(remaining.len());
        let hits: Vec<Hit> = remaining.drain(..take).collect();
        Ok(ScrollPage {
            cursor: Some(cursor.to_string()),
            hits,
        })
    }

    fn clear_scroll(&self, cursor: &str) -> StoreResult<()> {
        self.enter("clear_scroll")?;
        self.state.write().scrolls.remove(cursor);
        Ok(())
    }
}
