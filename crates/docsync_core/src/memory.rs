//! Volatile in-process backend.

use crate::backend::{DocBackend, FinalizeOnce};
use crate::error::{BackendError, BackendResult};
use crate::options::BackendKind;
use crate::report::BatchReport;
use docsync_store::{DocId, Document, Fields};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File extension of memory backend snapshots.
pub const SNAPSHOT_EXTENSION: &str = "snapshot.cbor";

/// The durable artifact written by [`MemoryBackend`] on finalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The backend name.
    pub name: String,
    /// Every document, ordered by id.
    pub documents: Vec<Document>,
}

impl Snapshot {
    /// Writes the snapshot as CBOR, replacing `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> BackendResult<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            ciborium::into_writer(self, &mut writer)
                .map_err(|e| BackendError::snapshot(format!("encode {}: {e}", path.display())))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads a CBOR snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    pub fn read_from(path: &Path) -> BackendResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        ciborium::from_reader(reader)
            .map_err(|e| BackendError::snapshot(format!("decode {}: {e}", path.display())))
    }
}

/// A backend over an in-process map from id to document.
///
/// This backend is suitable for tests and staging. It is the only backend
/// that materializes on finalize: the whole map is written to
/// `<snapshot_dir>/<name>.snapshot.cbor`.
///
/// - `insert` overwrites on id collision (last write wins)
/// - `update` is a shallow merge and is ignored for absent ids
/// - ids are enumerated in sorted order
///
/// # Example
///
/// ```rust
/// use docsync_core::{DocBackend, MemoryBackend};
/// use docsync_store::Document;
///
/// let mut backend = MemoryBackend::new("staging");
/// backend.insert(vec![Document::new("a"), Document::new("a")]).unwrap();
/// assert_eq!(backend.count(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryBackend {
    name: String,
    docs: BTreeMap<DocId, Document>,
    snapshot_dir: PathBuf,
    finalized: FinalizeOnce,
}

impl MemoryBackend {
    /// Creates an empty backend. Snapshots go to the current directory.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: BTreeMap::new(),
            snapshot_dir: PathBuf::from("."),
            finalized: FinalizeOnce::default(),
        }
    }

    /// Sets the directory snapshots are written to.
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }

    /// Rebuilds a backend from a snapshot file.
    ///
    /// The snapshot directory is the file's directory, so finalizing the
    /// loaded backend rewrites the same file.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read.
    pub fn load_snapshot(path: &Path) -> BackendResult<Self> {
        let snapshot = Snapshot::read_from(path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut backend = Self::new(snapshot.name).with_snapshot_dir(dir);
        for doc in snapshot.documents {
            backend.docs.insert(doc.id().to_string(), doc);
        }
        Ok(backend)
    }

    /// Returns the path finalize writes to.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_dir
            .join(format!("{}.{SNAPSHOT_EXTENSION}", self.name))
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn count(&self) -> usize {
        self.docs.len()
    }

    /// Iterates over documents in id order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    /// Returns a mutable document, for in-place edits such as applying a diff.
    pub fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.docs.get_mut(id)
    }

    /// Writes the snapshot without ending the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn write_snapshot(&self) -> BackendResult<PathBuf> {
        let path = self.snapshot_path();
        let snapshot = Snapshot {
            name: self.name.clone(),
            documents: self.docs.values().cloned().collect(),
        };
        snapshot.write_to(&path)?;
        info!(backend = %self.name, count = self.docs.len(), path = %path.display(), "snapshot written");
        Ok(path)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

impl DocBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn insert(&mut self, docs: Vec<Document>) -> BackendResult<BatchReport> {
        let count = docs.len() as u64;
        for doc in docs {
            self.docs.insert(doc.id().to_string(), doc);
        }
        Ok(BatchReport::all_succeeded(count))
    }

    fn update(&mut self, id: &str, patch: Fields) -> BackendResult<u64> {
        match self.docs.get_mut(id) {
            Some(doc) => {
                doc.merge(&patch);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn drop_all(&mut self) -> BackendResult<()> {
        self.docs.clear();
        Ok(())
    }

    fn get_id_list(&self) -> BackendResult<Vec<DocId>> {
        Ok(self.docs.keys().cloned().collect())
    }

    fn get_from_id(&self, id: &str) -> BackendResult<Document> {
        self.docs
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::not_found(id))
    }

    fn finalize(&mut self) -> BackendResult<Option<BatchReport>> {
        self.finalized.check(&self.name)?;
        self.write_snapshot()?;
        self.finalized.mark();
        Ok(None)
    }
}
