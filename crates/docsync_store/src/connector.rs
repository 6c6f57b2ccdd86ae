//! Connectors turn connection parameters into driver handles.

use crate::collection::DocumentCollection;
use crate::error::StoreResult;
use crate::index::SearchIndex;
use crate::replica::ReplicaServer;
use std::sync::Arc;

/// Opens document database collections.
pub trait CollectionConnector: Send + Sync {
    /// Opens `collection` in database `db_name`.
    fn connect_collection(
        &self,
        host: Option<&str>,
        db_name: &str,
        collection: &str,
    ) -> StoreResult<Arc<dyn DocumentCollection>>;
}

/// Opens search index handles.
pub trait IndexConnector: Send + Sync {
    /// Opens document type `doc_type` of index `index_name` on `host`.
    fn connect_index(
        &self,
        host: &str,
        index_name: &str,
        doc_type: &str,
    ) -> StoreResult<Arc<dyn SearchIndex>>;
}

/// Opens replicated store servers.
pub trait ReplicaConnector: Send + Sync {
    /// Connects to the server at `host`.
    fn connect_server(&self, host: &str) -> StoreResult<Arc<dyn ReplicaServer>>;
}
