//! Backend options and tunables.

use crate::error::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Ids per count query. Keeps a single `$in` request under the payload ceiling.
pub const DEFAULT_COUNT_STEP: usize = 100_000;
/// Ids per remove request.
pub const DEFAULT_REMOVE_STEP: usize = 10_000;
/// Ids per multi-get request.
pub const DEFAULT_MGET_STEP: usize = 100_000;
/// Hits per scroll page.
pub const DEFAULT_SCROLL_STEP: usize = 10_000;
/// Scroll cursor lifetime.
pub const DEFAULT_SCROLL_KEEPALIVE: &str = "10m";
/// Documents per replicated-store upload request.
pub const DEFAULT_UPLOAD_STEP: usize = 10_000;
/// Per-request payload ceiling of the document database (16 MB).
pub const PAYLOAD_CEILING_BYTES: usize = 16 * 1024 * 1024;
/// Number of distinct failure reasons reported after a bulk upload.
pub const FAILURE_REASON_REPORT_LIMIT: usize = 10;

/// The backend implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Volatile in-process map.
    Memory,
    /// Document database collection.
    DocumentStore,
    /// Search index.
    SearchIndex,
    /// Replicated document store.
    ReplicatedStore,
}

impl BackendKind {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::DocumentStore => "document_store",
            BackendKind::SearchIndex => "search_index",
            BackendKind::ReplicatedStore => "replicated_store",
        }
    }

    /// Returns the option fields this kind cannot be built without.
    #[must_use]
    pub const fn required_fields(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Memory => &[],
            BackendKind::DocumentStore => &["db_name", "collection_name"],
            BackendKind::SearchIndex => &["index_name", "host", "doc_type"],
            BackendKind::ReplicatedStore => &["host", "db_name"],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "document_store" | "mongo" => Ok(BackendKind::DocumentStore),
            "search_index" | "es" => Ok(BackendKind::SearchIndex),
            "replicated_store" | "couchdb" => Ok(BackendKind::ReplicatedStore),
            other => Err(BackendError::configuration(format!(
                "unknown backend kind: {other}"
            ))),
        }
    }
}

/// Which backend to construct and how to reach its store.
///
/// Empty strings count as absent.
///
/// # Example
///
/// ```rust
/// use docsync_core::{BackendKind, BackendOptions};
///
/// let options = BackendOptions::new(BackendKind::SearchIndex)
///     .index_name("genedoc")
///     .host("localhost:9200")
///     .doc_type("gene");
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptions {
    /// The backend kind.
    pub kind: BackendKind,
    /// Search index name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Store host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Search index document type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    /// Collection name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    /// Memory backend name, used for the snapshot file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
}

impl BackendOptions {
    /// Creates options for `kind` with no connection fields.
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            index_name: None,
            host: None,
            doc_type: None,
            db_name: None,
            collection_name: None,
            target_name: None,
        }
    }

    /// Sets the index name.
    #[must_use]
    pub fn index_name(mut self, value: impl Into<String>) -> Self {
        self.index_name = Some(value.into());
        self
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, value: impl Into<String>) -> Self {
        self.host = Some(value.into());
        self
    }

    /// Sets the document type.
    #[must_use]
    pub fn doc_type(mut self, value: impl Into<String>) -> Self {
        self.doc_type = Some(value.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn db_name(mut self, value: impl Into<String>) -> Self {
        self.db_name = Some(value.into());
        self
    }

    /// Sets the collection name.
    #[must_use]
    pub fn collection_name(mut self, value: impl Into<String>) -> Self {
        self.collection_name = Some(value.into());
        self
    }

    /// Sets the memory backend name.
    #[must_use]
    pub fn target_name(mut self, value: impl Into<String>) -> Self {
        self.target_name = Some(value.into());
        self
    }

    /// Parses options from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is not valid options JSON.
    pub fn from_json_str(text: &str) -> BackendResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| BackendError::configuration(format!("invalid options: {e}")))
    }

    /// Reads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a configuration
    /// error if it does not hold valid options.
    pub fn from_json_file(path: &Path) -> BackendResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Returns a field by name, treating empty strings as absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "index_name" => &self.index_name,
            "host" => &self.host,
            "doc_type" => &self.doc_type,
            "db_name" => &self.db_name,
            "collection_name" => &self.collection_name,
            "target_name" => &self.target_name,
            _ => return None,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Returns a required field.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the field is absent.
    pub fn require(&self, name: &str) -> BackendResult<&str> {
        self.field(name).ok_or_else(|| {
            BackendError::configuration(format!("{} backend requires {name}", self.kind))
        })
    }

    /// Returns the memory backend name, defaulting to `unnamed`.
    #[must_use]
    pub fn target_name_or_default(&self) -> &str {
        self.field("target_name").unwrap_or("unnamed")
    }

    /// Checks that every field the chosen kind requires is present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming all missing fields.
    pub fn validate(&self) -> BackendResult<()> {
        let missing: Vec<&str> = self
            .kind
            .required_fields()
            .iter()
            .copied()
            .filter(|name| self.field(name).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(BackendError::configuration(format!(
            "cannot create {} backend from options, missing: {}",
            self.kind,
            missing.join(", ")
        )))
    }
}
