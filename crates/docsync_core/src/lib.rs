//! # DocSync Core
//!
//! A uniform backend contract over heterogeneous document stores.
//!
//! Ingestion and indexing pipelines hold one [`DocBackend`] and drive it
//! through insert, update, drop, enumerate, fetch and finalize without
//! knowing which store sits underneath. Each backend translates the contract
//! into the native primitives of its store and adds its own extensions:
//!
//! - [`MemoryBackend`] - volatile map, snapshotted to CBOR on finalize
//! - [`DocumentStoreBackend`] - document database collection with diff
//!   updates, order-preserving multi-get and chunked count/remove
//! - [`SearchIndexBackend`] - search index with scrolling queries and index
//!   lifecycle
//! - [`ReplicatedStoreBackend`] - replicated store with a write buffer that
//!   is flushed on finalize
//!
//! ## Key Invariants
//!
//! - `update` never creates a document unless upsert is explicitly requested
//! - `drop_all` on an absent target is a no-op
//! - `get_from_id` on an absent id fails with [`BackendError::NotFound`] for
//!   every backend
//! - Partial bulk failures never raise; they are reported in a
//!   [`BatchReport`], which is the only place that information lives
//! - `finalize` runs at most once per backend instance
//!
//! ## Example
//!
//! ```rust
//! use docsync_core::{DocBackend, MemoryBackend};
//! use docsync_store::Document;
//!
//! let mut backend = MemoryBackend::new("genes");
//! let report = backend.insert(vec![Document::new("1017")]).unwrap();
//! assert!(report.is_clean());
//! assert_eq!(backend.get_id_list().unwrap(), vec!["1017"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod chunk;
mod diff;
mod docstore;
mod error;
mod factory;
mod handle;
mod memory;
mod options;
mod postprocess;
mod replicated;
mod report;
mod search;

pub use backend::DocBackend;
pub use diff::Diff;
pub use docstore::DocumentStoreBackend;
pub use error::{BackendError, BackendResult};
pub use factory::{build_backend, StoreConnectors};
pub use handle::LazyHandle;
pub use memory::{MemoryBackend, Snapshot, SNAPSHOT_EXTENSION};
pub use options::{
    BackendKind, BackendOptions, DEFAULT_COUNT_STEP, DEFAULT_MGET_STEP, DEFAULT_REMOVE_STEP,
    DEFAULT_SCROLL_KEEPALIVE, DEFAULT_SCROLL_STEP, DEFAULT_UPLOAD_STEP,
    FAILURE_REASON_REPORT_LIMIT, PAYLOAD_CEILING_BYTES,
};
pub use postprocess::{DocPostProcessor, HomologeneTrim, DEFAULT_SPECIES};
pub use replicated::{CacheLoad, DocCache, ReplicatedStoreBackend};
pub use report::BatchReport;
pub use search::{DocFeed, MgetIter, ScrollOptions, SearchIndexBackend};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
