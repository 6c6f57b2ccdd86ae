//! Backend construction from options.

use crate::backend::DocBackend;
use crate::docstore::DocumentStoreBackend;
use crate::error::{BackendError, BackendResult};
use crate::memory::MemoryBackend;
use crate::options::{BackendKind, BackendOptions};
use crate::replicated::ReplicatedStoreBackend;
use crate::search::SearchIndexBackend;
use docsync_store::{CollectionConnector, IndexConnector, ReplicaConnector};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// The drivers [`build_backend`] may connect through.
///
/// Only the connector for the requested kind has to be present.
#[derive(Clone, Default)]
pub struct StoreConnectors {
    /// Document database connector.
    pub collections: Option<Arc<dyn CollectionConnector>>,
    /// Search index connector.
    pub indices: Option<Arc<dyn IndexConnector>>,
    /// Replicated store connector.
    pub replicas: Option<Arc<dyn ReplicaConnector>>,
    /// Directory memory backends write snapshots to.
    pub snapshot_dir: Option<PathBuf>,
}

impl StoreConnectors {
    /// Creates an empty set; only memory backends can be built from it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the document database connector.
    #[must_use]
    pub fn with_collections(mut self, connector: Arc<dyn CollectionConnector>) -> Self {
        self.collections = Some(connector);
        self
    }

    /// Sets the search index connector.
    #[must_use]
    pub fn with_indices(mut self, connector: Arc<dyn IndexConnector>) -> Self {
        self.indices = Some(connector);
        self
    }

    /// Sets the replicated store connector.
    #[must_use]
    pub fn with_replicas(mut self, connector: Arc<dyn ReplicaConnector>) -> Self {
        self.replicas = Some(connector);
        self
    }

    /// Sets the snapshot directory for memory backends.
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }
}

impl fmt::Debug for StoreConnectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnectors")
            .field("collections", &self.collections.is_some())
            .field("indices", &self.indices.is_some())
            .field("replicas", &self.replicas.is_some())
            .field("snapshot_dir", &self.snapshot_dir)
            .finish()
    }
}

fn connector<T: ?Sized>(slot: &Option<Arc<T>>, kind: BackendKind) -> BackendResult<Arc<T>> {
    slot.clone()
        .ok_or_else(|| BackendError::dependency_unavailable(format!("no connector for {kind}")))
}

/// Builds the backend `options` describe.
///
/// Options are validated before any connector is touched. The document
/// store backend opens its collection on first use; the other kinds connect
/// here.
///
/// # Errors
///
/// Returns [`BackendError::Configuration`] if a required option is missing,
/// and [`BackendError::DependencyUnavailable`] if the kind's connector is
/// absent or refuses the connection.
///
/// # Example
///
/// ```rust
/// use docsync_core::{build_backend, BackendKind, BackendOptions, StoreConnectors};
///
/// let options = BackendOptions::new(BackendKind::Memory).target_name("staging");
/// let backend = build_backend(&options, &StoreConnectors::new()).unwrap();
/// assert_eq!(backend.name(), "staging");
///
/// let incomplete = BackendOptions::new(BackendKind::DocumentStore).db_name("genedoc");
/// assert!(build_backend(&incomplete, &StoreConnectors::new()).is_err());
/// ```
pub fn build_backend(
    options: &BackendOptions,
    connectors: &StoreConnectors,
) -> BackendResult<Box<dyn DocBackend>> {
    options.validate()?;
    debug!(kind = %options.kind, "building backend");

    match options.kind {
        BackendKind::Memory => {
            let mut backend = MemoryBackend::new(options.target_name_or_default());
            if let Some(dir) = &connectors.snapshot_dir {
                backend = backend.with_snapshot_dir(dir.clone());
            }
            Ok(Box::new(backend))
        }
        BackendKind::DocumentStore => {
            let collections = connector(&connectors.collections, options.kind)?;
            let host = options.field("host").map(str::to_string);
            let db_name = options.require("db_name")?.to_string();
            let collection_name = options.require("collection_name")?.to_string();
            let name = collection_name.clone();
            let backend = DocumentStoreBackend::deferred(name, move || {
                collections
                    .connect_collection(host.as_deref(), &db_name, &collection_name)
                    .map_err(|e| BackendError::dependency_unavailable(e.to_string()))
            });
            Ok(Box::new(backend))
        }
        BackendKind::SearchIndex => {
            let indices = connector(&connectors.indices, options.kind)?;
            Ok(Box::new(SearchIndexBackend::from_options(options, indices.as_ref())?))
        }
        BackendKind::ReplicatedStore => {
            let replicas = connector(&connectors.replicas, options.kind)?;
            let server = replicas
                .connect_server(options.require("host")?)
                .map_err(|e| BackendError::dependency_unavailable(e.to_string()))?;
            Ok(Box::new(ReplicatedStoreBackend::open(
                server,
                options.require("db_name")?,
            )?))
        }
    }
}
