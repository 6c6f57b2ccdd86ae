//! Property-based test generators using proptest.
//!
//! Provides strategies for documents, patches and diffs that respect the
//! document model: every document has a string `_id`, and generated field
//! names never collide with it.

use docsync_core::{Diff, DEFAULT_SPECIES};
use docsync_store::{DocId, Document, Fields};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy for generating document ids.
pub fn doc_id_strategy() -> impl Strategy<Value = DocId> {
    prop::string::string_regex("[a-z0-9]{1,8}").expect("Invalid regex")
}

/// Strategy for generating field names. Never `_id`.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for generating scalar JSON values (no floats).
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::from),
    ]
}

/// Strategy for generating field values: scalars or short scalar arrays.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => scalar_value_strategy(),
        1 => prop::collection::vec(scalar_value_strategy(), 0..4).prop_map(Value::Array),
    ]
}

/// Strategy for generating field maps with up to `max_fields` entries.
pub fn fields_strategy(max_fields: usize) -> impl Strategy<Value = Fields> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..=max_fields)
        .prop_map(|map| map.into_iter().collect())
}

/// Strategy for generating one document.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    (doc_id_strategy(), fields_strategy(6)).prop_map(|(id, fields)| Document::with_fields(id, fields))
}

/// Strategy for generating a batch of documents with distinct ids.
pub fn unique_documents_strategy(max_docs: usize) -> impl Strategy<Value = Vec<Document>> {
    prop::collection::btree_map(doc_id_strategy(), fields_strategy(4), 0..=max_docs).prop_map(
        |docs| {
            docs.into_iter()
                .map(|(id, fields)| Document::with_fields(id, fields))
                .collect()
        },
    )
}

/// Strategy for generating a diff against document `id`.
pub fn diff_strategy(id: DocId) -> impl Strategy<Value = Diff> {
    (
        fields_strategy(3),
        fields_strategy(3),
        prop::collection::vec(field_name_strategy(), 0..3),
    )
        .prop_map(move |(add, update, delete)| Diff {
            id: id.clone(),
            add,
            update,
            delete,
        })
}

/// Strategy for generating taxon ids, mixing kept and foreign species.
pub fn taxid_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        prop::sample::select(DEFAULT_SPECIES.to_vec()),
        prop::sample::select(vec![9913i64, 9615, 9031, 4932, 28985]),
    ]
}

/// Strategy for generating gene documents with a `homologene.genes` list.
pub fn gene_document_strategy() -> impl Strategy<Value = Document> {
    (
        doc_id_strategy(),
        prop::collection::vec((taxid_strategy(), 1i64..1_000_000), 0..8),
    )
        .prop_map(|(id, homologs)| {
            let genes: Vec<Value> = homologs
                .into_iter()
                .map(|(taxid, gene)| json!([taxid, gene]))
                .collect();
            let mut doc = Document::new(id);
            doc.insert("homologene", json!({"id": 1, "genes": genes}));
            doc
        })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_store::ID_FIELD;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn field_names_never_shadow_id(name in field_name_strategy()) {
            prop_assert_ne!(name.as_str(), ID_FIELD);
        }

        #[test]
        fn document_batches_have_distinct_ids(docs in unique_documents_strategy(10)) {
            let distinct: HashSet<&str> = docs.iter().map(Document::id).collect();
            prop_assert_eq!(distinct.len(), docs.len());
        }

        #[test]
        fn gene_documents_carry_pairs(doc in gene_document_strategy()) {
            let genes = doc.get("homologene").unwrap()["genes"].as_array().unwrap().clone();
            for entry in genes {
                prop_assert_eq!(entry.as_array().map(Vec::len), Some(2));
            }
        }
    }
}
