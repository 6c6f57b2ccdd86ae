//! Test fixtures and backend helpers.
//!
//! Provides document builders and backends wired to the in-memory drivers,
//! so every backend kind can be exercised without a running store.

use docsync_core::{
    build_backend, BackendKind, BackendOptions, DocBackend, DocumentStoreBackend,
    ReplicatedStoreBackend, SearchIndexBackend, StoreConnectors,
};
use docsync_store::memory::{
    InMemoryCollection, InMemoryConnector, InMemoryReplicaDb, InMemoryReplicaServer,
    InMemorySearchIndex,
};
use docsync_store::{CollectionConnector, DocId, Document, Fields};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Every backend kind, in a fixed order.
pub const ALL_KINDS: [BackendKind; 4] = [
    BackendKind::Memory,
    BackendKind::DocumentStore,
    BackendKind::SearchIndex,
    BackendKind::ReplicatedStore,
];

/// Host used by fixture options.
pub const TEST_HOST: &str = "localhost";
/// Database name used by fixture options.
pub const TEST_DB: &str = "genedoc";
/// Collection, index and memory target name used by fixture options.
pub const TEST_TARGET: &str = "genes";
/// Search index document type used by fixture options.
pub const TEST_DOC_TYPE: &str = "gene";

/// Builds a document from a JSON object literal.
///
/// # Panics
///
/// Panics if the value is not an object with a string `_id`.
pub fn doc(value: Value) -> Document {
    Document::from_value(value).expect("fixture document must have a string _id")
}

/// Builds a field map from a JSON object literal.
///
/// # Panics
///
/// Panics if the value is not an object.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture fields must be an object, got {other}"),
    }
}

/// Converts string literals to ids.
pub fn ids(list: &[&str]) -> Vec<DocId> {
    list.iter().map(|id| id.to_string()).collect()
}

/// Creates `n` documents `d0..dn` with a numeric field `n`.
pub fn numbered_docs(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| doc(json!({"_id": format!("d{i}"), "n": i})))
        .collect()
}

/// Creates a gene document with `homologene.genes` set to `[taxid, gene]` pairs.
pub fn gene_doc(id: &str, homologs: &[(i64, i64)]) -> Document {
    let genes: Vec<Value> = homologs.iter().map(|(taxid, gene)| json!([taxid, gene])).collect();
    doc(json!({"_id": id, "homologene": {"id": 1, "genes": genes}}))
}

/// Returns complete options for `kind`, pointing at the fixture names.
pub fn options_for(kind: BackendKind) -> BackendOptions {
    let options = BackendOptions::new(kind);
    match kind {
        BackendKind::Memory => options.target_name(TEST_TARGET),
        BackendKind::DocumentStore => options
            .host(TEST_HOST)
            .db_name(TEST_DB)
            .collection_name(TEST_TARGET),
        BackendKind::SearchIndex => options
            .host(TEST_HOST)
            .index_name(TEST_TARGET)
            .doc_type(TEST_DOC_TYPE),
        BackendKind::ReplicatedStore => options.host(TEST_HOST).db_name(TEST_DB),
    }
}

/// Wires one in-memory connector in as the driver for all three stores.
pub fn in_memory_connectors(connector: Arc<InMemoryConnector>) -> StoreConnectors {
    StoreConnectors::new()
        .with_collections(connector.clone())
        .with_indices(connector.clone())
        .with_replicas(connector)
}

/// A prepared backend of any kind, built through the factory.
pub struct TestBackend {
    /// The backend under test.
    pub backend: Box<dyn DocBackend>,
    /// The connector the backend's driver came from.
    pub connector: Arc<InMemoryConnector>,
    /// Holds the memory backend's snapshot directory.
    temp_dir: TempDir,
}

impl TestBackend {
    /// Builds and prepares a backend of `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the backend cannot be built.
    pub fn new(kind: BackendKind) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let connector = Arc::new(InMemoryConnector::new());
        let connectors =
            in_memory_connectors(connector.clone()).with_snapshot_dir(temp_dir.path());
        let mut backend =
            build_backend(&options_for(kind), &connectors).expect("Failed to build backend");
        backend.prepare().expect("Failed to prepare backend");
        Self {
            backend,
            connector,
            temp_dir,
        }
    }

    /// Builds one backend of every kind.
    pub fn all() -> Vec<Self> {
        ALL_KINDS.into_iter().map(Self::new).collect()
    }

    /// Returns the directory memory snapshots are written to.
    pub fn snapshot_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the document store driver.
    ///
    /// # Panics
    ///
    /// Panics if the collection cannot be opened.
    pub fn collection(&self) -> Arc<InMemoryCollection> {
        self.connector
            .connect_collection(Some(TEST_HOST), TEST_DB, TEST_TARGET)
            .expect("Failed to open collection");
        self.connector
            .collection(TEST_DB, TEST_TARGET)
            .expect("collection is registered")
    }

    /// Returns the search index driver.
    ///
    /// # Panics
    ///
    /// Panics if the backend is not a search index backend.
    pub fn index(&self) -> Arc<InMemorySearchIndex> {
        self.connector
            .index(TEST_HOST, TEST_TARGET, TEST_DOC_TYPE)
            .expect("index is registered")
    }

    /// Returns the replicated database driver.
    ///
    /// # Panics
    ///
    /// Panics if the backend is not a replicated store backend.
    pub fn replica_db(&self) -> Arc<InMemoryReplicaDb> {
        self.connector
            .server(TEST_HOST)
            .and_then(|server| server.database(TEST_DB))
            .expect("database is registered")
    }
}

impl std::ops::Deref for TestBackend {
    type Target = dyn DocBackend;

    fn deref(&self) -> &Self::Target {
        &*self.backend
    }
}

impl std::ops::DerefMut for TestBackend {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.backend
    }
}

/// A document store backend over a fresh in-memory collection.
pub fn docstore_fixture() -> (Arc<InMemoryCollection>, DocumentStoreBackend) {
    let collection = Arc::new(InMemoryCollection::new(TEST_TARGET));
    let backend = DocumentStoreBackend::new(collection.clone());
    (collection, backend)
}

/// A prepared search index backend over a fresh in-memory index.
///
/// # Panics
///
/// Panics if the index cannot be prepared.
pub fn search_fixture() -> (Arc<InMemorySearchIndex>, SearchIndexBackend) {
    let index = Arc::new(InMemorySearchIndex::new(TEST_TARGET, TEST_DOC_TYPE));
    let mut backend = SearchIndexBackend::new(index.clone());
    backend.prepare().expect("Failed to prepare index");
    (index, backend)
}

/// A replicated backend over a fresh in-memory server.
///
/// # Panics
///
/// Panics if the database cannot be created.
pub fn replicated_fixture() -> (Arc<InMemoryReplicaServer>, ReplicatedStoreBackend) {
    let server = Arc::new(InMemoryReplicaServer::new());
    let backend =
        ReplicatedStoreBackend::open(server.clone(), TEST_DB).expect("Failed to open database");
    (server, backend)
}
