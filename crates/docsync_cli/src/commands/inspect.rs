//! Inspect command implementation.

use docsync_core::Snapshot;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// Backend name recorded in the snapshot.
    pub name: String,
    /// Number of documents.
    pub document_count: usize,
    /// Snapshot file size in bytes.
    pub file_size: u64,
    /// How many documents carry each field, excluding `_id`.
    pub field_counts: BTreeMap<String, usize>,
    /// The requested document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
}

/// Runs the inspect command.
pub fn run(path: &Path, id: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, id)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result)?,
    }

    Ok(())
}

fn inspect(path: &Path, id: Option<&str>) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at {:?}", path).into());
    }
    let file_size = std::fs::metadata(path)?.len();
    let snapshot = Snapshot::read_from(path)?;

    let mut field_counts = BTreeMap::new();
    for doc in &snapshot.documents {
        for key in doc.fields().keys().filter(|key| key.as_str() != docsync_store::ID_FIELD) {
            *field_counts.entry(key.clone()).or_insert(0) += 1;
        }
    }

    let document = match id {
        Some(id) => {
            let doc = snapshot
                .documents
                .iter()
                .find(|doc| doc.id() == id)
                .ok_or_else(|| format!("Document {id} not in snapshot"))?;
            Some(doc.clone().into_value())
        }
        None => None,
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        name: snapshot.name,
        document_count: snapshot.documents.len(),
        file_size,
        field_counts,
        document,
    })
}

fn print_text_output(result: &InspectResult) -> Result<(), serde_json::Error> {
    println!("DocSync Snapshot Inspection");
    println!("===========================");
    println!();
    println!("Path: {}", result.path);
    println!("Name: {}", result.name);
    println!("Size: {} bytes", result.file_size);
    println!();
    println!("Documents: {}", result.document_count);

    if !result.field_counts.is_empty() {
        println!();
        println!("Fields:");
        for (field, count) in &result.field_counts {
            println!("  {field:<24} {count}");
        }
    }

    if let Some(document) = &result.document {
        println!();
        println!("{}", serde_json::to_string_pretty(document)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::{DocBackend, MemoryBackend};
    use docsync_store::Document;
    use serde_json::json;
    use tempfile::TempDir;

    fn snapshot(dir: &TempDir) -> std::path::PathBuf {
        let mut backend = MemoryBackend::new("genes").with_snapshot_dir(dir.path());
        backend
            .insert(vec![
                Document::from_value(json!({"_id": "1017", "symbol": "CDK2", "taxid": 9606})).unwrap(),
                Document::from_value(json!({"_id": "1018", "symbol": "CDK3"})).unwrap(),
            ])
            .unwrap();
        backend.write_snapshot().unwrap()
    }

    #[test]
    fn counts_fields() {
        let dir = TempDir::new().unwrap();
        let result = inspect(&snapshot(&dir), None).unwrap();
        assert_eq!(result.name, "genes");
        assert_eq!(result.document_count, 2);
        assert_eq!(result.field_counts["symbol"], 2);
        assert_eq!(result.field_counts["taxid"], 1);
        assert!(!result.field_counts.contains_key("_id"));
        assert!(result.document.is_none());
    }

    #[test]
    fn shows_one_document() {
        let dir = TempDir::new().unwrap();
        let result = inspect(&snapshot(&dir), Some("1018")).unwrap();
        assert_eq!(result.document, Some(json!({"_id": "1018", "symbol": "CDK3"})));
        assert!(inspect(&snapshot(&dir), Some("ghost")).is_err());
    }

    #[test]
    fn missing_snapshot_fails() {
        let dir = TempDir::new().unwrap();
        assert!(inspect(&dir.path().join("absent.snapshot.cbor"), None).is_err());
    }
}
