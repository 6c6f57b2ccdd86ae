//! Connector handing out in-memory drivers.

use super::{InMemoryCollection, InMemoryReplicaServer, InMemorySearchIndex};
use crate::collection::DocumentCollection;
use crate::connector::{CollectionConnector, IndexConnector, ReplicaConnector};
use crate::error::{StoreError, StoreResult};
use crate::index::SearchIndex;
use crate::replica::ReplicaServer;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A connector for all three stores backed by in-memory drivers.
///
/// Connecting twice with the same parameters returns the same driver, so a
/// test can hand the connector to a factory and inspect the driver afterwards.
#[derive(Debug, Default)]
pub struct InMemoryConnector {
    collections: RwLock<HashMap<(String, String), Arc<InMemoryCollection>>>,
    indices: RwLock<HashMap<(String, String, String), Arc<InMemorySearchIndex>>>,
    servers: RwLock<HashMap<String, Arc<InMemoryReplicaServer>>>,
    connections: AtomicU64,
    refuse: AtomicBool,
}

impl InMemoryConnector {
    /// Creates a connector with no drivers yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every connect attempt fail with [`StoreError::Unavailable`].
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Returns how many successful connections were made.
    #[must_use]
    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Returns the collection driver, if one was connected.
    #[must_use]
    pub fn collection(&self, db_name: &str, collection: &str) -> Option<Arc<InMemoryCollection>> {
        self.collections
            .read()
            .get(&(db_name.to_string(), collection.to_string()))
            .cloned()
    }

    /// Returns the index driver, if one was connected.
    #[must_use]
    pub fn index(&self, host: &str, index_name: &str, doc_type: &str) -> Option<Arc<InMemorySearchIndex>> {
        self.indices
            .read()
            .get(&(host.to_string(), index_name.to_string(), doc_type.to_string()))
            .cloned()
    }

    /// Returns the server driver, if one was connected.
    #[must_use]
    pub fn server(&self, host: &str) -> Option<Arc<InMemoryReplicaServer>> {
        self.servers.read().get(host).cloned()
    }

    fn admit(&self, target: &str) -> StoreResult<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("connection to {target} refused")));
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl CollectionConnector for InMemoryConnector {
    fn connect_collection(
        &self,
        _host: Option<&str>,
        db_name: &str,
        collection: &str,
    ) -> StoreResult<Arc<dyn DocumentCollection>> {
        self.admit(&format!("{db_name}.{collection}"))?;
        let handle = self
            .collections
            .write()
            .entry((db_name.to_string(), collection.to_string()))
            .or_insert_with(|| Arc::new(InMemoryCollection::new(collection)))
            .clone();
        let handle: Arc<dyn DocumentCollection> = handle;
        Ok(handle)
    }
}

impl IndexConnector for InMemoryConnector {
    fn connect_index(
        &self,
        host: &str,
        index_name: &str,
        doc_type: &str,
    ) -> StoreResult<Arc<dyn SearchIndex>> {
        self.admit(host)?;
        let handle = self
            .indices
            .write()
            .entry((host.to_string(), index_name.to_string(), doc_type.to_string()))
            .or_insert_with(|| Arc::new(InMemorySearchIndex::new(index_name, doc_type)))
            .clone();
        let handle: Arc<dyn SearchIndex> = handle;
        Ok(handle)
    }
}

impl ReplicaConnector for InMemoryConnector {
    fn connect_server(&self, host: &str) -> StoreResult<Arc<dyn ReplicaServer>> {
        self.admit(host)?;
        let handle = self
            .servers
            .write()
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(InMemoryReplicaServer::new()))
            .clone();
        let handle: Arc<dyn ReplicaServer> = handle;
        Ok(handle)
    }
}
