//! Property tests for backend invariants.

use docsync_core::{
    DocBackend, DocPostProcessor, HomologeneTrim, MemoryBackend, ReplicatedStoreBackend,
    DEFAULT_SPECIES,
};
use docsync_store::memory::InMemoryReplicaServer;
use docsync_store::{Document, Fields, ReplicaDb};
use docsync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn kept_taxids(doc: &Document) -> Vec<i64> {
    doc.get("homologene")
        .and_then(|h| h.get("genes"))
        .and_then(|g| g.as_array())
        .map(|genes| genes.iter().filter_map(|pair| pair[0].as_i64()).collect())
        .unwrap_or_default()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn memory_enumerates_every_inserted_id(docs in unique_documents_strategy(20)) {
        let mut backend = MemoryBackend::new("prop");
        let expected: BTreeSet<String> = docs.iter().map(|d| d.id().to_string()).collect();
        backend.insert(docs).unwrap();
        let listed: BTreeSet<String> = backend.get_id_list().unwrap().into_iter().collect();
        prop_assert_eq!(listed, expected);
    }

    #[test]
    fn docstore_chunking_preserves_totals(
        docs in unique_documents_strategy(12),
        step in 1usize..6,
    ) {
        let (collection, mut backend) = docstore_fixture();
        let wanted: Vec<String> = docs.iter().map(|d| d.id().to_string()).collect();
        backend.insert(docs).unwrap();
        collection.calls().reset();

        let chunked = backend.count_from_ids(&wanted, step).unwrap();
        prop_assert_eq!(chunked, wanted.len() as u64);
        prop_assert_eq!(collection.calls().count("count_in"), wanted.len().div_ceil(step));
    }

    #[test]
    fn docstore_mget_follows_request_order(
        docs in unique_documents_strategy(10),
        missing in prop::collection::vec("[A-Z]{2}", 0..4),
    ) {
        let (_, mut backend) = docstore_fixture();
        let mut wanted: Vec<String> = docs.iter().rev().map(|d| d.id().to_string()).collect();
        let expected = wanted.clone();
        wanted.extend(missing);
        backend.insert(docs).unwrap();

        let found: Vec<String> = backend
            .mget_from_ids(&wanted)
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn update_never_creates(id in doc_id_strategy(), patch in fields_strategy(3)) {
        for mut backend in TestBackend::all() {
            backend.update(&id, patch.clone()).unwrap();
            backend.finalize().unwrap();
            prop_assert!(backend.get_from_id(&id).unwrap_err().is_not_found());
            prop_assert!(backend.get_id_list().unwrap().is_empty());
        }
    }

    #[test]
    fn diff_apply_matches_between(old in document_strategy(), new_fields in fields_strategy(6)) {
        let new = Document::with_fields(old.id(), new_fields);
        let diff = docsync_core::Diff::between(&old, &new);
        let mut patched = old.clone();
        diff.apply_to(&mut patched, &Fields::new());
        prop_assert_eq!(patched, new);
    }

    #[test]
    fn species_trim_is_idempotent(mut doc in gene_document_strategy()) {
        let trim = HomologeneTrim::default();
        trim.process(&mut doc);
        let once = doc.clone();
        prop_assert!(!trim.process(&mut doc));
        prop_assert_eq!(&doc, &once);
        for taxid in kept_taxids(&doc) {
            prop_assert!(DEFAULT_SPECIES.contains(&taxid));
        }
    }

    #[test]
    fn flushed_documents_keep_only_listed_species(docs in prop::collection::vec(gene_document_strategy(), 1..6)) {
        let server = Arc::new(InMemoryReplicaServer::new());
        let mut backend = ReplicatedStoreBackend::open(server.clone(), TEST_DB).unwrap();
        let mut unique = std::collections::BTreeMap::new();
        for doc in docs {
            unique.insert(doc.id().to_string(), doc);
        }
        let ids: Vec<String> = unique.keys().cloned().collect();
        backend.insert(unique.into_values().collect()).unwrap();
        for id in &ids {
            prop_assert_eq!(backend.update(id, fields(serde_json::json!({"seen": true}))).unwrap(), 1);
        }
        let report = backend.finalize().unwrap().unwrap();
        prop_assert!(report.is_clean());

        let db = server.database(TEST_DB).unwrap();
        for doc in db.all_docs().unwrap() {
            for taxid in kept_taxids(&doc) {
                prop_assert!(DEFAULT_SPECIES.contains(&taxid));
            }
        }
    }
}
