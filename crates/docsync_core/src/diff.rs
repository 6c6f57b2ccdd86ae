//! Structured add/update/delete patches against one document.

use docsync_store::{DocId, Document, Fields, UpdateSpec, ID_FIELD};
use serde::{Deserialize, Serialize};

/// A change to one document.
///
/// `add` and `update` are merged into a single field overwrite (with
/// `update` winning on overlap); `delete` names fields to remove. A diff with
/// all three slots empty is a legal no-op.
///
/// # Example
///
/// ```rust
/// use docsync_core::Diff;
/// use docsync_store::Document;
/// use serde_json::json;
///
/// let mut doc = Document::from_value(json!({"_id": "1", "y": 1, "z": 3})).unwrap();
/// let diff = Diff::new("1")
///     .with_add("x", json!(1))
///     .with_update("y", json!(2))
///     .with_delete("z");
/// diff.apply_to(&mut doc, &Default::default());
/// assert_eq!(doc.into_value(), json!({"_id": "1", "x": 1, "y": 2}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// The target document id.
    #[serde(rename = "_id")]
    pub id: DocId,
    /// New fields.
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    pub add: Fields,
    /// Fields to overwrite.
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    pub update: Fields,
    /// Fields to remove.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

impl Diff {
    /// Creates an empty diff for `id`.
    pub fn new(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds a new field.
    #[must_use]
    pub fn with_add(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.add.insert(key.into(), value);
        self
    }

    /// Adds a field overwrite.
    #[must_use]
    pub fn with_update(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.update.insert(key.into(), value);
        self
    }

    /// Adds a field removal.
    #[must_use]
    pub fn with_delete(mut self, key: impl Into<String>) -> Self {
        self.delete.push(key.into());
        self
    }

    /// Returns true if all three slots are empty.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Returns `add`, `update` and `extra` merged into one overwrite set.
    #[must_use]
    pub fn set_fields(&self, extra: &Fields) -> Fields {
        let mut set = self.add.clone();
        for (key, value) in self.update.iter().chain(extra) {
            set.insert(key.clone(), value.clone());
        }
        set.remove(ID_FIELD);
        set
    }

    /// Returns the `$set`/`$unset` pair this diff (plus `extra`) amounts to.
    #[must_use]
    pub fn to_update_spec(&self, extra: &Fields) -> UpdateSpec {
        UpdateSpec {
            set: self.set_fields(extra),
            unset: self
                .delete
                .iter()
                .filter(|field| field.as_str() != ID_FIELD)
                .cloned()
                .collect(),
        }
    }

    /// Applies the diff to a document in place, returning true if it changed.
    ///
    /// The caller is responsible for matching `doc.id()` against `self.id`.
    pub fn apply_to(&self, doc: &mut Document, extra: &Fields) -> bool {
        let spec = self.to_update_spec(extra);
        let mut changed = doc.merge(&spec.set);
        for field in &spec.unset {
            changed |= doc.remove(field).is_some();
        }
        changed
    }

    /// Computes the diff that turns `old` into `new`.
    ///
    /// Fields only in `new` go to `add`, fields whose value changed go to
    /// `update`, fields only in `old` go to `delete`. The id is taken from
    /// `new`.
    #[must_use]
    pub fn between(old: &Document, new: &Document) -> Self {
        let mut diff = Self::new(new.id());
        for (key, value) in new.fields() {
            if key == ID_FIELD {
                continue;
            }
            match old.get(key) {
                None => {
                    diff.add.insert(key.clone(), value.clone());
                }
                Some(previous) if previous != value => {
                    diff.update.insert(key.clone(), value.clone());
                }
                Some(_) => {}
            }
        }
        diff.delete = old
            .fields()
            .keys()
            .filter(|key| key.as_str() != ID_FIELD && !new.contains_key(key))
            .cloned()
            .collect();
        diff
    }
}
