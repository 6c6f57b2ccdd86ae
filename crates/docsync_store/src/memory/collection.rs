//! In-memory document database collection.

use super::CallLog;
use crate::collection::{
    BulkWriteResult, DocumentCollection, FsyncMode, SetOp, UpdateResult, UpdateSpec,
};
use crate::document::{DocId, Document};
use crate::error::{StoreError, StoreResult, WriteFailure};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory collection.
///
/// Documents are kept ordered by id. `$in` queries can be capped with
/// [`InMemoryCollection::with_max_ids_per_query`] to emulate the payload
/// ceiling of a real document database.
///
/// # Example
///
/// ```rust
/// use docsync_store::{Document, DocumentCollection, memory::InMemoryCollection};
///
/// let collection = InMemoryCollection::new("genes").with_max_ids_per_query(2);
/// collection.insert_many(vec![Document::new("a"), Document::new("b")]).unwrap();
///
/// let ids: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
/// assert!(collection.count_in(&ids).is_err());
/// assert_eq!(collection.count_in(&ids[..2]).unwrap(), 2);
/// ```
#[derive(Debug)]
pub struct InMemoryCollection {
    name: String,
    docs: RwLock<BTreeMap<DocId, Document>>,
    max_ids_per_query: Option<usize>,
    unavailable: AtomicBool,
    fsyncs: RwLock<Vec<FsyncMode>>,
    calls: CallLog,
}

impl InMemoryCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(BTreeMap::new()),
            max_ids_per_query: None,
            unavailable: AtomicBool::new(false),
            fsyncs: RwLock::new(Vec::new()),
            calls: CallLog::default(),
        }
    }

    /// Rejects `$in` queries carrying more than `limit` ids.
    #[must_use]
    pub fn with_max_ids_per_query(mut self, limit: usize) -> Self {
        self.max_ids_per_query = Some(limit);
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

    /// Returns the fsync requests received so far.
    #[must_use]
    pub fn fsync_log(&self) -> Vec<FsyncMode> {
        self.fsyncs.read().clone()
    }

    /// Returns a copy of all documents, ordered by id.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.docs.read().values().cloned().collect()
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        self.calls.record(op);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "collection {} is unreachable",
                self.name
            )));
        }
        Ok(())
    }

    fn check_payload(&self, ids: &[DocId]) -> StoreResult<()> {
        match self.max_ids_per_query {
            Some(limit) if ids.len() > limit => Err(StoreError::PayloadTooLarge {
                size: ids.len(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}

impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> StoreResult<u64> {
        self.enter("count")?;
        Ok(self.docs.read().len() as u64)
    }

    fn insert_many(&self, docs: Vec<Document>) -> StoreResult<Vec<DocId>> {
        self.enter("insert_many")?;
        let mut stored = self.docs.write();

        let mut seen = HashSet::new();
        let failures: Vec<WriteFailure> = docs
            .iter()
            .filter(|doc| stored.contains_key(doc.id()) || !seen.insert(doc.id().to_string()))
            .map(|doc| WriteFailure::new(doc.id(), format!("duplicate key: {}", doc.id())))
            .collect();
        if !failures.is_empty() {
            return Err(StoreError::BulkWrite {
                written: 0,
                failures,
            });
        }

        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            ids.push(doc.id().to_string());
            stored.insert(doc.id().to_string(), doc);
        }
        Ok(ids)
    }

    fn bulk_set(&self, ops: Vec<SetOp>) -> StoreResult<BulkWriteResult> {
        self.enter("bulk_set")?;
        let mut stored = self.docs.write();
        let mut result = BulkWriteResult::default();

        for op in ops {
            match stored.get_mut(&op.id) {
                Some(doc) => {
                    result.matched += 1;
                    if doc.merge(&op.set) {
                        result.modified += 1;
                    }
                }
                None if op.upsert => {
                    stored.insert(op.id.clone(), Document::with_fields(op.id, op.set));
                    result.upserted += 1;
                }
                None => {}
            }
        }
        Ok(result)
    }

    fn update_one(&self, id: &str, spec: UpdateSpec, upsert: bool) -> StoreResult<UpdateResult> {
        self.enter("update_one")?;
        let mut stored = self.docs.write();

        let Some(doc) = stored.get_mut(id) else {
            if upsert {
                stored.insert(id.to_string(), Document::with_fields(id, spec.set));
            }
            return Ok(UpdateResult::default());
        };

        let mut changed = doc.merge(&spec.set);
        for field in &spec.unset {
            changed |= doc.remove(field).is_some();
        }
        Ok(UpdateResult {
            matched: 1,
            modified: u64::from(changed),
        })
    }

    fn drop_collection(&self) -> StoreResult<()> {
        self.enter("drop_collection")?;
        self.docs.write().clear();
        Ok(())
    }

    fn find_ids(&self) -> StoreResult<Vec<DocId>> {
        self.enter("find_ids")?;
        Ok(self.docs.read().keys().cloned().collect())
    }

    fn find_one(&self, id: &str) -> StoreResult<Option<Document>> {
        self.enter("find_one")?;
        Ok(self.docs.read().get(id).cloned())
    }

    fn find_in(&self, ids: &[DocId]) -> StoreResult<Vec<Document>> {
        self.enter("find_in")?;
        self.check_payload(ids)?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .docs
            .read()
            .values()
            .filter(|doc| wanted.contains(doc.id()))
            .cloned()
            .collect())
    }

    fn count_in(&self, ids: &[DocId]) -> StoreResult<u64> {
        self.enter("count_in")?;
        self.check_payload(ids)?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let stored = self.docs.read();
        Ok(wanted.iter().filter(|id| stored.contains_key(**id)).count() as u64)
    }

    fn remove_in(&self, ids: &[DocId]) -> StoreResult<u64> {
        self.enter("remove_in")?;
        self.check_payload(ids)?;
        let mut stored = self.docs.write();
        let removed = ids.iter().filter(|id| stored.remove(*id).is_some()).count();
        Ok(removed as u64)
    }

    fn fsync(&self, mode: FsyncMode) -> StoreResult<()> {
        self.enter("fsync")?;
        self.fsyncs.write().push(mode);
        Ok(())
    }
}
