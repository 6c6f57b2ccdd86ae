//! # DocSync Store
//!
//! Document type and store driver traits for DocSync.
//!
//! This crate is the lowest layer of DocSync. It describes the three external
//! document stores only through the narrow set of native primitives the
//! backends need:
//!
//! - [`DocumentCollection`] - a document database collection (insert-many,
//!   ordered bulk `$set`, `$in` queries, fsync)
//! - [`SearchIndex`] - a search index (bulk add, queued partial updates,
//!   scrolling search, mapping lifecycle)
//! - [`ReplicaServer`] / [`ReplicaDb`] - a replicated document store
//!   (database lifecycle, bulk create/update, all-docs view)
//!
//! ## Design Principles
//!
//! - Drivers perform native primitives only; policy (chunking, failure
//!   aggregation, write buffering) lives in `docsync_core`
//! - Drivers must be `Send + Sync` and use interior mutability, like the
//!   client handles they stand in for
//! - Every primitive returns a [`StoreResult`]; nothing is silently dropped
//!
//! ## Reference Drivers
//!
//! The [`memory`] module provides in-memory drivers for all three stores.
//! They are used by tests and staging runs and can emulate the payload
//! ceiling, outages and write conflicts of the real stores.
//!
//! ## Example
//!
//! ```rust
//! use docsync_store::{Document, DocumentCollection, memory::InMemoryCollection};
//!
//! let collection = InMemoryCollection::new("genes");
//! collection.insert_many(vec![Document::new("1017")]).unwrap();
//! assert_eq!(collection.count().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod connector;
mod document;
mod error;
mod index;
pub mod memory;
mod replica;

pub use collection::{BulkWriteResult, DocumentCollection, FsyncMode, SetOp, UpdateResult, UpdateSpec};
pub use connector::{CollectionConnector, IndexConnector, ReplicaConnector};
pub use document::{DocId, Document, Fields, ID_FIELD};
pub use error::{StoreError, StoreResult, WriteFailure};
pub use index::{BulkItem, Hit, ScrollPage, SearchIndex};
pub use replica::{DocWriteOutcome, ReplicaDb, ReplicaServer, REV_FIELD};
