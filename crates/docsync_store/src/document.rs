//! The schema-less document type.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the mandatory unique key field.
pub const ID_FIELD: &str = "_id";

/// A document id.
pub type DocId = String;

/// A mapping from field name to value.
pub type Fields = Map<String, Value>;

/// A schema-less document with a mandatory string `_id`.
///
/// Structure beyond `_id` is emergent. The id is fixed at construction:
/// [`Document::insert`], [`Document::remove`] and [`Document::merge`] never
/// touch it.
///
/// # Example
///
/// ```rust
/// use docsync_store::Document;
/// use serde_json::json;
///
/// let doc = Document::from_value(json!({"_id": "1017", "symbol": "CDK2"})).unwrap();
/// assert_eq!(doc.id(), "1017");
/// assert_eq!(doc.get("symbol"), Some(&json!("CDK2")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Fields", into = "Fields")]
pub struct Document {
    fields: Fields,
}

impl Document {
    /// Creates a document holding only its id.
    pub fn new(id: impl Into<DocId>) -> Self {
        let mut fields = Fields::new();
        fields.insert(ID_FIELD.to_string(), Value::String(id.into()));
        Self { fields }
    }

    /// Creates a document from a field map.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if `_id` is absent or not a string.
    pub fn from_fields(fields: Fields) -> StoreResult<Self> {
        match fields.get(ID_FIELD) {
            Some(Value::String(_)) => Ok(Self { fields }),
            Some(other) => Err(StoreError::InvalidDocument(format!(
                "{ID_FIELD} must be a string, got {other}"
            ))),
            None => Err(StoreError::InvalidDocument(format!(
                "missing {ID_FIELD} field"
            ))),
        }
    }

    /// Creates a document from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidDocument`] if the value is not an object
    /// with a string `_id`.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            other => Err(StoreError::InvalidDocument(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Creates a document with the given id and fields.
    ///
    /// Any `_id` inside `fields` is replaced by `id`.
    pub fn with_fields(id: impl Into<DocId>, fields: Fields) -> Self {
        let mut doc = Self::new(id);
        doc.merge(&fields);
        doc
    }

    /// Returns the document id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self.fields.get(ID_FIELD) {
            Some(Value::String(id)) => id,
            _ => "",
        }
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a mutable field value. `_id` is not reachable this way.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        if key == ID_FIELD {
            return None;
        }
        self.fields.get_mut(key)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Sets a field, returning the previous value. `_id` is ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if key == ID_FIELD {
            return None;
        }
        self.fields.insert(key, value)
    }

    /// Removes a field, returning its value. `_id` is ignored.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key == ID_FIELD {
            return None;
        }
        self.fields.remove(key)
    }

    /// Shallow-merges `patch` into this document (field overwrite).
    ///
    /// Returns true if any field changed.
    pub fn merge(&mut self, patch: &Fields) -> bool {
        let mut changed = false;
        for (key, value) in patch {
            if key == ID_FIELD {
                continue;
            }
            if self.fields.get(key) != Some(value) {
                self.fields.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Returns the number of fields, including `_id`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document holds nothing but its id.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.len() <= 1
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consumes the document, returning its field map.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Consumes the document, returning it as a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Fields> for Document {
    type Error = StoreError;

    fn try_from(fields: Fields) -> Result<Self, Self::Error> {
        Self::from_fields(fields)
    }
}

impl From<Document> for Fields {
    fn from(doc: Document) -> Self {
        doc.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn new_holds_only_id() {
        let doc = Document::new("a");
        assert_eq!(doc.id(), "a");
        assert_eq!(doc.len(), 1);
        assert!(doc.is_empty());
    }

    #[test]
    fn from_value_requires_string_id() {
        assert!(Document::from_value(json!({"_id": "x", "n": 1})).is_ok());
        assert!(matches!(
            Document::from_value(json!({"n": 1})),
            Err(StoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            Document::from_value(json!({"_id": 7})),
            Err(StoreError::InvalidDocument(_))
        ));
        assert!(Document::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn merge_overwrites_and_keeps_id() {
        let mut doc = Document::from_value(json!({"_id": "a", "x": 1, "y": 1})).unwrap();
        let changed = doc.merge(&fields(json!({"_id": "b", "y": 2, "z": 3})));
        assert!(changed);
        assert_eq!(doc.id(), "a");
        assert_eq!(doc.into_value(), json!({"_id": "a", "x": 1, "y": 2, "z": 3}));
    }

    #[test]
    fn merge_reports_unchanged() {
        let mut doc = Document::from_value(json!({"_id": "a", "x": 1})).unwrap();
        assert!(!doc.merge(&fields(json!({"x": 1}))));
    }

    #[test]
    fn id_is_immutable() {
        let mut doc = Document::new("a");
        assert_eq!(doc.insert("_id", json!("b")), None);
        assert_eq!(doc.remove("_id"), None);
        assert!(doc.get_mut("_id").is_none());
        assert_eq!(doc.id(), "a");
    }

    #[test]
    fn serde_validates_id() {
        let doc: Document = serde_json::from_str(r#"{"_id":"a","v":[1,2]}"#).unwrap();
        assert_eq!(doc.get("v"), Some(&json!([1, 2])));
        assert!(serde_json::from_str::<Document>(r#"{"v":1}"#).is_err());

        let text = serde_json::to_string(&doc).unwrap();
        assert!(text.contains("\"_id\":\"a\""));
    }
}
