//! In-memory replicated document store.

use super::CallLog;
use crate::document::{DocId, Document};
use crate::error::{StoreError, StoreResult};
use crate::replica::{DocWriteOutcome, ReplicaDb, ReplicaServer, REV_FIELD};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An in-memory replicated database.
///
/// Every stored document carries a `_rev` of the form `<generation>-mem`.
/// A write to an existing document must present the current `_rev`,
/// otherwise it is rejected with reason `conflict`.
#[derive(Debug)]
pub struct InMemoryReplicaDb {
    name: String,
    docs: RwLock<BTreeMap<DocId, Document>>,
    rejected: RwLock<HashMap<DocId, String>>,
    commits: AtomicU64,
    compactions: AtomicU64,
    deleted: AtomicBool,
    calls: CallLog,
}

impl InMemoryReplicaDb {
    /// Creates an empty database.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: RwLock::new(BTreeMap::new()),
            rejected: RwLock::new(HashMap::new()),
            commits: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            deleted: AtomicBool::new(false),
            calls: CallLog::default(),
        }
    }

    /// Makes every future write of `id` fail with `reason`.
    pub fn reject_writes(&self, id: impl Into<DocId>, reason: impl Into<String>) {
        self.rejected.write().insert(id.into(), reason.into());
    }

    /// Returns the call log.
    #[must_use]
    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    /// Returns how many times the database was committed.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns how many times the database was compacted.
    #[must_use]
    pub fn compaction_count(&self) -> u64 {
        self.compactions.load(Ordering::SeqCst)
    }

    /// Returns true once the server has deleted this database.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    fn check_live(&self) -> StoreResult<()> {
        if self.is_deleted() {
            return Err(StoreError::missing(format!("database {}", self.name)));
        }
        Ok(())
    }

    fn generation(rev: Option<&Value>) -> u64 {
        rev.and_then(Value::as_str)
            .and_then(|rev| rev.split('-').next())
            .and_then(|generation| generation.parse().ok())
            .unwrap_or(0)
    }

    fn write_one(stored: &mut BTreeMap<DocId, Document>, mut doc: Document) -> DocWriteOutcome {
        let id = doc.id().to_string();
        let current = stored.get(&id).map(|existing| existing.get(REV_FIELD).cloned());
        let generation = match current {
            Some(current_rev) => {
                if doc.get(REV_FIELD) != current_rev.as_ref() {
                    return DocWriteOutcome::rejected(id, "conflict");
                }
                Self::generation(current_rev.as_ref())
            }
            None => 0,
        };
        doc.insert(REV_FIELD, Value::String(format!("{}-mem", generation + 1)));
        stored.insert(id.clone(), doc);
        DocWriteOutcome::accepted(id)
    }
}

impl ReplicaDb for InMemoryReplicaDb {
    fn name(&self) -> &str {
        &self.name
    }

    fn bulk_update(&self, docs: Vec<Document>) -> StoreResult<Vec<DocWriteOutcome>> {
        self.calls.record("bulk_update");
        self.check_live()?;
        let rejected = self.rejected.read();
        let mut stored = self.docs.write();
        Ok(docs
            .into_iter()
            .map(|doc| match rejected.get(doc.id()) {
                Some(reason) => DocWriteOutcome::rejected(doc.id(), reason.clone()),
                None => Self::write_one(&mut stored, doc),
            })
            .collect())
    }

    fn all_docs(&self) -> StoreResult<Vec<Document>> {
        self.calls.record("all_docs");
        self.check_live()?;
        Ok(self.docs.read().values().cloned().collect())
    }

    fn all_ids(&self) -> StoreResult<Vec<DocId>> {
        self.calls.record("all_ids");
        self.check_live()?;
        Ok(self.docs.read().keys().cloned().collect())
    }

    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        self.calls.record("get");
        self.check_live()?;
        Ok(self.docs.read().get(id).cloned())
    }

    fn commit(&self) -> StoreResult<()> {
        self.calls.record("commit");
        self.check_live()?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn compact(&self) -> StoreResult<()> {
        self.calls.record("compact");
        self.check_live()?;
        self.compactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An in-memory server hosting named [`InMemoryReplicaDb`]s.
#[derive(Debug, Default)]
pub struct InMemoryReplicaServer {
    dbs: RwLock<HashMap<String, Arc<InMemoryReplicaDb>>>,
    lose_next_create: AtomicBool,
    unavailable: AtomicBool,
}

impl InMemoryReplicaServer {
    /// Creates a server with no databases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `create` behave as if a concurrent creator won the race:
    /// the database comes into existence but the call reports `AlreadyExists`.
    pub fn lose_next_create_race(&self) {
        self.lose_next_create.store(true, Ordering::SeqCst);
    }

    /// Makes every call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the concrete database, if it exists.
    #[must_use]
    pub fn database(&self, name: &str) -> Option<Arc<InMemoryReplicaDb>> {
        self.dbs.read().get(name).cloned()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("replica server is unreachable".into()));
        }
        Ok(())
    }
}

impl ReplicaServer for InMemoryReplicaServer {
    fn open(&self, name: &str) -> StoreResult<Arc<dyn ReplicaDb>> {
        self.check()?;
        match self.dbs.read().get(name) {
            Some(db) => {
                let db: Arc<dyn ReplicaDb> = db.clone();
                Ok(db)
            }
            None => Err(StoreError::missing(format!("database {name}"))),
        }
    }

    fn create(&self, name: &str) -> StoreResult<Arc<dyn ReplicaDb>> {
        self.check()?;
        let mut dbs = self.dbs.write();
        if self.lose_next_create.swap(false, Ordering::SeqCst) {
            dbs.entry(name.to_string())
                .or_insert_with(|| Arc::new(InMemoryReplicaDb::new(name)));
            return Err(StoreError::already_exists(format!("database {name}")));
        }
        if dbs.contains_key(name) {
            return Err(StoreError::already_exists(format!("database {name}")));
        }
        let db = Arc::new(InMemoryReplicaDb::new(name));
        dbs.insert(name.to_string(), db.clone());
        let db: Arc<dyn ReplicaDb> = db;
        Ok(db)
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        self.check()?;
        match self.dbs.write().remove(name) {
            Some(db) => {
                // Handles still held by clients fail with `Missing`.
                db.deleted.store(true, Ordering::SeqCst);
                db.docs.write().clear();
                Ok(())
            }
            None => Err(StoreError::missing(format!("database {name}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bump_revision() {
        let db = InMemoryReplicaDb::new("genes");
        let outcomes = db.bulk_update(vec![Document::new("a")]).unwrap();
        assert!(outcomes[0].ok);

        let stored = db.get("a").unwrap().unwrap();
        assert_eq!(stored.get(REV_FIELD).and_then(Value::as_str), Some("1-mem"));

        let outcomes = db.bulk_update(vec![stored]).unwrap();
        assert!(outcomes[0].ok);
        let stored = db.get("a").unwrap().unwrap();
        assert_eq!(stored.get(REV_FIELD).and_then(Value::as_str), Some("2-mem"));
    }

    #[test]
    fn stale_revision_conflicts() {
        let db = InMemoryReplicaDb::new("genes");
        db.bulk_update(vec![Document::new("a")]).unwrap();

        let outcomes = db.bulk_update(vec![Document::new("a")]).unwrap();
        assert_eq!(outcomes[0], DocWriteOutcome::rejected("a", "conflict"));
    }

    #[test]
    fn rejected_ids_fail_with_reason() {
        let db = InMemoryReplicaDb::new("genes");
        db.reject_writes("b", "forbidden");
        let outcomes = db
            .bulk_update(vec![Document::new("a"), Document::new("b")])
            .unwrap();
        assert!(outcomes[0].ok);
        assert_eq!(outcomes[1].reason.as_deref(), Some("forbidden"));
    }

    #[test]
    fn server_lifecycle() {
        let server = InMemoryReplicaServer::new();
        assert!(server.open("genes").err().unwrap().is_missing());

        server.create("genes").unwrap();
        assert!(matches!(
            server.create("genes"),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(server.open("genes").is_ok());

        server.delete("genes").unwrap();
        assert!(server.delete("genes").unwrap_err().is_missing());
    }

    #[test]
    fn deleted_handle_reports_missing() {
        let server = InMemoryReplicaServer::new();
        let handle = server.create("genes").unwrap();
        handle.bulk_update(vec![Document::new("a")]).unwrap();
        server.delete("genes").unwrap();

        assert!(server.database("genes").is_none());
        assert!(handle.bulk_update(vec![Document::new("b")]).unwrap_err().is_missing());
        assert!(handle.all_ids().unwrap_err().is_missing());
        assert!(handle.commit().unwrap_err().is_missing());

        let fresh = server.create("genes").unwrap();
        assert!(fresh.all_ids().unwrap().is_empty());
    }

    #[test]
    fn lost_create_race_still_creates() {
        let server = InMemoryReplicaServer::new();
        server.lose_next_create_race();
        assert!(matches!(
            server.create("genes"),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(server.open("genes").is_ok());
    }
}
