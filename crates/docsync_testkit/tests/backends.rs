//! Integration tests running the backend contract and each backend's
//! documented extensions against the in-memory drivers.

use docsync_core::{
    build_backend, BackendError, BackendKind, BackendOptions, Diff, DocBackend, DocPostProcessor,
    HomologeneTrim, MemoryBackend, ScrollOptions, DEFAULT_COUNT_STEP,
};
use docsync_store::memory::{InMemoryCollection, InMemoryConnector};
use docsync_store::{Document, Fields, ReplicaDb};
use docsync_testkit::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[test]
fn insert_then_enumerate_for_every_backend() {
    for mut backend in TestBackend::all() {
        contract::test_insert_then_enumerate(&mut *backend, numbered_docs(6));
    }
}

#[test]
fn update_of_missing_id_is_noop_for_every_backend() {
    for mut backend in TestBackend::all() {
        contract::test_update_missing_is_noop(&mut *backend, "ghost");
    }
}

#[test]
fn drop_of_absent_target_is_fine_for_every_backend() {
    for mut backend in TestBackend::all() {
        contract::test_drop_absent_target(&mut *backend);
    }
}

#[test]
fn missing_id_is_not_found_for_every_backend() {
    for backend in TestBackend::all() {
        contract::test_get_missing_is_not_found(&*backend, "ghost");
    }
}

#[test]
fn finalize_runs_once_for_every_backend() {
    for mut backend in TestBackend::all() {
        contract::test_finalize_once(&mut *backend);
    }
}

#[test]
fn updates_are_visible_after_finalize_for_every_backend() {
    for mut backend in TestBackend::all() {
        contract::test_update_visible_after_finalize(&mut *backend);
    }
}

#[test]
fn duplicate_id_policies() {
    let dup = || vec![doc(json!({"_id": "a", "v": 1})), doc(json!({"_id": "a", "v": 2}))];

    let mut memory = TestBackend::new(BackendKind::Memory);
    assert!(memory.insert(dup()).unwrap().is_clean());
    assert_eq!(memory.get_from_id("a").unwrap().get("v"), Some(&json!(2)));

    let mut search = TestBackend::new(BackendKind::SearchIndex);
    assert!(search.insert(dup()).unwrap().is_clean());
    assert_eq!(search.get_from_id("a").unwrap().get("v"), Some(&json!(2)));

    let mut docstore = TestBackend::new(BackendKind::DocumentStore);
    let report = docstore.insert(dup()).unwrap();
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed, 2);
    assert!(docstore.get_id_list().unwrap().is_empty());
}

#[test]
fn memory_finalize_writes_named_snapshot() {
    let mut backend = TestBackend::new(BackendKind::Memory);
    backend.insert(numbered_docs(3)).unwrap();
    backend.finalize().unwrap();

    let path = backend.snapshot_dir().join("genes.snapshot.cbor");
    let loaded = MemoryBackend::load_snapshot(&path).unwrap();
    assert_eq!(loaded.get_id_list().unwrap(), ids(&["d0", "d1", "d2"]));
}

#[test]
fn mget_preserves_order_and_drops_missing() {
    let (_, mut docstore) = docstore_fixture();
    let (_, mut search) = search_fixture();
    let seed = || ["A", "B", "C"].iter().map(|id| Document::new(*id)).collect::<Vec<_>>();
    docstore.insert(seed()).unwrap();
    search.insert(seed()).unwrap();
    let wanted = ids(&["C", "A", "Z", "B"]);

    let found: Vec<String> = docstore
        .mget_from_ids(&wanted)
        .unwrap()
        .iter()
        .map(|doc| doc.id().to_string())
        .collect();
    assert_eq!(found, ids(&["C", "A", "B"]));

    let found: Vec<String> = search
        .mget_from_ids(&wanted, 2, true)
        .unwrap()
        .map(|doc| doc.unwrap().id().to_string())
        .collect();
    assert_eq!(found, ids(&["C", "A", "B"]));
}

#[test]
fn chunked_count_and_remove_match_unchunked_totals() {
    let wanted = ids(&["d0", "d1", "d2", "d3", "d4"]);

    let (collection, mut backend) = docstore_fixture();
    backend.insert(numbered_docs(5)).unwrap();
    collection.calls().reset();

    let unchunked = backend.count_from_ids(&wanted, DEFAULT_COUNT_STEP).unwrap();
    assert_eq!(collection.calls().count("count_in"), 1);
    collection.calls().reset();
    assert_eq!(backend.count_from_ids(&wanted, 2).unwrap(), unchunked);
    assert_eq!(collection.calls().count("count_in"), 3);

    assert_eq!(backend.remove_from_ids(&wanted, 2).unwrap(), 5);
    assert_eq!(collection.calls().count("remove_in"), 3);
    assert_eq!(backend.count().unwrap(), 0);
}

#[test]
fn chunking_avoids_payload_ceiling() {
    let collection = Arc::new(InMemoryCollection::new("capped").with_max_ids_per_query(2));
    let mut backend = docsync_core::DocumentStoreBackend::new(collection);
    backend.insert(numbered_docs(5)).unwrap();
    let wanted = ids(&["d0", "d1", "d2", "d3", "d4"]);

    assert!(matches!(
        backend.count_from_ids(&wanted, 5),
        Err(BackendError::SizeLimitExceeded { size: 5, limit: 2 })
    ));
    assert_eq!(backend.count_from_ids(&wanted, 2).unwrap(), 5);
}

#[test]
fn update_diff_example() {
    let (_, mut backend) = docstore_fixture();
    backend
        .insert(vec![doc(json!({"_id": "1", "y": 1, "z": 3}))])
        .unwrap();

    let diff: Diff = serde_json::from_value(json!({
        "_id": "1", "add": {"x": 1}, "update": {"y": 2}, "delete": ["z"]
    }))
    .unwrap();
    assert_eq!(backend.update_diff(&diff, &Fields::new()).unwrap(), 1);
    assert_eq!(
        backend.get_from_id("1").unwrap().into_value(),
        json!({"_id": "1", "x": 1, "y": 2})
    );

    assert_eq!(backend.update_diff(&Diff::new("1"), &Fields::new()).unwrap(), 0);
    assert_eq!(
        backend.get_from_id("1").unwrap().into_value(),
        json!({"_id": "1", "x": 1, "y": 2})
    );
}

#[test]
fn replicated_updates_reach_store_only_on_finalize() {
    let mut backend = TestBackend::new(BackendKind::ReplicatedStore);
    backend.insert(vec![doc(json!({"_id": "1017", "v": 1}))]).unwrap();

    backend.update("1017", fields(json!({"v": 2}))).unwrap();
    assert_eq!(backend.get_from_id("1017").unwrap().get("v"), Some(&json!(1)));
    let stored = backend.replica_db().get("1017").unwrap().unwrap();
    assert_eq!(stored.get("v"), Some(&json!(1)));

    let report = backend.finalize().unwrap().expect("flush report");
    assert!(report.is_clean());
    assert_eq!(backend.get_from_id("1017").unwrap().get("v"), Some(&json!(2)));
}

#[test]
fn replicated_failures_are_reported_not_raised() {
    let mut backend = TestBackend::new(BackendKind::ReplicatedStore);
    backend.insert(numbered_docs(3)).unwrap();
    for id in ["d0", "d1", "d2"] {
        backend.update(id, fields(json!({"seen": true}))).unwrap();
    }
    backend.replica_db().reject_writes("d1", "forbidden");

    let report = backend.finalize().unwrap().expect("flush report");
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].id.as_deref(), Some("d1"));
}

#[test]
fn docstore_outage_is_reported_not_raised() {
    let mut backend = TestBackend::new(BackendKind::DocumentStore);
    backend.collection().set_unavailable(true);
    let report = backend.insert(numbered_docs(2)).unwrap();
    assert_eq!(report.failed, 2);
    assert!(!report.is_clean());
}

#[test]
fn search_query_pages_lazily_and_releases_cursor() {
    let (index, mut search) = search_fixture();
    search.insert(numbered_docs(5)).unwrap();
    let feed = search
        .query(None, &ScrollOptions::default().with_step(2))
        .unwrap();
    assert_eq!(feed.count(), 5);
    assert_eq!(index.open_scrolls(), 0);

    let bad = json!({"script": {}});
    assert!(search.query(Some(&bad), &ScrollOptions::default()).is_err());
    assert_eq!(index.open_scrolls(), 0);
}

#[test]
fn species_trim_on_finalize() {
    let mut backend = TestBackend::new(BackendKind::ReplicatedStore);
    backend
        .insert(vec![gene_doc("1017", &[(9606, 1017), (9913, 281669), (10090, 12566)])])
        .unwrap();
    backend.update("1017", fields(json!({"symbol": "CDK2"}))).unwrap();
    backend.finalize().unwrap();

    let genes = backend.get_from_id("1017").unwrap().get("homologene").unwrap()["genes"].clone();
    assert_eq!(genes, json!([[9606, 1017], [10090, 12566]]));

    let mut once = gene_doc("x", &[(9606, 1), (1, 2)]);
    HomologeneTrim::default().process(&mut once);
    let mut twice = once.clone();
    HomologeneTrim::default().process(&mut twice);
    assert_eq!(once, twice);
}

#[test]
fn factory_rejects_incomplete_options() {
    let connectors = in_memory_connectors(Arc::new(InMemoryConnector::new()));
    for kind in ALL_KINDS {
        let complete = options_for(kind);
        assert!(build_backend(&complete, &connectors).is_ok(), "{kind}");
        if kind == BackendKind::Memory {
            continue;
        }
        let bare = BackendOptions::new(kind);
        assert!(
            matches!(
                build_backend(&bare, &connectors),
                Err(BackendError::Configuration { .. })
            ),
            "{kind}"
        );
    }
}

#[test]
fn backends_are_usable_as_trait_objects() {
    let backends: Vec<Box<dyn DocBackend>> = TestBackend::all()
        .into_iter()
        .map(|test| {
            let TestBackend { backend, .. } = test;
            backend
        })
        .collect();
    let kinds: Vec<BackendKind> = backends.iter().map(|b| b.kind()).collect();
    assert_eq!(kinds, ALL_KINDS.to_vec());
}
