//! Contract checks shared by every backend.
//!
//! Each check drives a backend only through [`DocBackend`] and panics with a
//! message naming the backend when the contract is violated. Run them against
//! fresh backends, such as those from [`crate::TestBackend::all`].

use crate::fixtures::fields;
use docsync_core::{BackendError, DocBackend};
use docsync_store::{DocId, Document};
use serde_json::json;
use std::collections::HashSet;

/// Tests that every inserted id is enumerated afterwards.
///
/// `docs` must have distinct ids.
pub fn test_insert_then_enumerate(backend: &mut dyn DocBackend, docs: Vec<Document>) {
    let expected: Vec<DocId> = docs.iter().map(|doc| doc.id().to_string()).collect();
    let report = backend.insert(docs).expect("Failed to insert");
    assert!(report.is_clean(), "{}: insert reported {report:?}", backend.name());
    assert_eq!(report.succeeded, expected.len() as u64, "{}", backend.name());

    let listed: HashSet<DocId> = backend
        .get_id_list()
        .expect("Failed to list ids")
        .into_iter()
        .collect();
    for id in &expected {
        assert!(listed.contains(id), "{}: id {id} not enumerated", backend.name());
    }
}

/// Tests that every inserted document can be fetched with its fields intact.
pub fn test_insert_then_fetch(backend: &mut dyn DocBackend, docs: Vec<Document>) {
    backend.insert(docs.clone()).expect("Failed to insert");
    for doc in docs {
        let fetched = backend.get_from_id(doc.id()).expect("Failed to fetch");
        for (key, value) in doc.fields() {
            assert_eq!(
                fetched.get(key),
                Some(value),
                "{}: field {key} of {}",
                backend.name(),
                doc.id()
            );
        }
    }
}

/// Tests that updating an absent id creates nothing, even after finalize.
pub fn test_update_missing_is_noop(backend: &mut dyn DocBackend, id: &str) {
    backend
        .update(id, fields(json!({"x": 1})))
        .expect("Failed to update");
    backend.finalize().expect("Failed to finalize");

    assert!(
        matches!(backend.get_from_id(id), Err(BackendError::NotFound { .. })),
        "{}: update created {id}",
        backend.name()
    );
    let listed = backend.get_id_list().expect("Failed to list ids");
    assert!(!listed.iter().any(|listed| listed == id), "{}", backend.name());
}

/// Tests that dropping twice succeeds and leaves nothing behind.
pub fn test_drop_absent_target(backend: &mut dyn DocBackend) {
    backend.drop_all().expect("Failed to drop");
    backend.drop_all().expect("Dropping an absent target must succeed");
    let listed = backend.get_id_list().expect("Failed to list ids");
    assert!(listed.is_empty(), "{}: {listed:?} survived drop", backend.name());
}

/// Tests that fetching an absent id fails with `NotFound`.
pub fn test_get_missing_is_not_found(backend: &dyn DocBackend, id: &str) {
    match backend.get_from_id(id) {
        Err(BackendError::NotFound { id: missing }) => assert_eq!(missing, id),
        other => panic!("{}: expected NotFound, got {other:?}", backend.name()),
    }
}

/// Tests that a second finalize is rejected.
pub fn test_finalize_once(backend: &mut dyn DocBackend) {
    backend.finalize().expect("Failed to finalize");
    assert!(
        matches!(backend.finalize(), Err(BackendError::AlreadyFinalized { .. })),
        "{}: finalize ran twice",
        backend.name()
    );
}

/// Tests that a committed update is visible after finalize.
///
/// Backends that queue or buffer updates must have applied them by then.
pub fn test_update_visible_after_finalize(backend: &mut dyn DocBackend) {
    backend
        .insert(vec![Document::with_fields("u1", fields(json!({"v": 1, "keep": true})))])
        .expect("Failed to insert");
    let affected = backend
        .update("u1", fields(json!({"v": 2})))
        .expect("Failed to update");
    assert_eq!(affected, 1, "{}", backend.name());
    backend.finalize().expect("Failed to finalize");

    let fetched = backend.get_from_id("u1").expect("Failed to fetch");
    assert_eq!(fetched.get("v"), Some(&json!(2)), "{}", backend.name());
    assert_eq!(fetched.get("keep"), Some(&json!(true)), "{}", backend.name());
}
