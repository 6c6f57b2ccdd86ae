//! Apply-diff command implementation.

use docsync_core::{Diff, Snapshot};
use docsync_store::Fields;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Tally of an apply-diff run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplyResult {
    /// Diffs that changed a document.
    pub applied: usize,
    /// Diffs that matched a document but changed nothing.
    pub unchanged: usize,
    /// Diffs whose document is not in the snapshot.
    pub missing: usize,
}

/// Runs the apply-diff command.
pub fn run(snapshot_path: &Path, diff_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let diffs = read_diffs(diff_path)?;
    let result = apply(snapshot_path, &diffs)?;

    println!("Applied {} diffs to {:?}", result.applied, snapshot_path);
    if result.unchanged > 0 {
        println!("  {} left documents unchanged", result.unchanged);
    }
    if result.missing > 0 {
        println!("  {} targeted documents not in the snapshot", result.missing);
    }
    Ok(())
}

/// Parses one diff object or an array of them.
pub fn read_diffs(path: &Path) -> Result<Vec<Diff>, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let diffs = match value {
        Value::Array(_) => serde_json::from_value(value)?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(diffs)
}

fn apply(snapshot_path: &Path, diffs: &[Diff]) -> Result<ApplyResult, Box<dyn std::error::Error>> {
    let mut snapshot = Snapshot::read_from(snapshot_path)?;
    let extra = Fields::new();
    let mut result = ApplyResult::default();

    for diff in diffs {
        match snapshot.documents.iter_mut().find(|doc| doc.id() == diff.id) {
            Some(doc) => {
                if diff.apply_to(doc, &extra) {
                    result.applied += 1;
                } else {
                    result.unchanged += 1;
                }
            }
            None => {
                warn!(id = %diff.id, "diff target not in snapshot");
                result.missing += 1;
            }
        }
    }

    if result.applied > 0 {
        snapshot.write_to(snapshot_path)?;
        info!(applied = result.applied, path = %snapshot_path.display(), "snapshot rewritten");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::{DocBackend, MemoryBackend};
    use docsync_store::Document;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn applies_diffs_in_place() {
        let dir = TempDir::new().unwrap();
        let mut backend = MemoryBackend::new("genes").with_snapshot_dir(dir.path());
        backend
            .insert(vec![Document::from_value(json!({"_id": "1", "y": 1, "z": 3})).unwrap()])
            .unwrap();
        let path = backend.write_snapshot().unwrap();

        let diff_path = dir.path().join("diff.json");
        fs::write(
            &diff_path,
            r#"[{"_id": "1", "add": {"x": 1}, "update": {"y": 2}, "delete": ["z"]}, {"_id": "2"}]"#,
        )
        .unwrap();

        let diffs = read_diffs(&diff_path).unwrap();
        let result = apply(&path, &diffs).unwrap();
        assert_eq!(result, ApplyResult { applied: 1, unchanged: 0, missing: 1 });

        let reloaded = MemoryBackend::load_snapshot(&path).unwrap();
        assert_eq!(
            reloaded.get_from_id("1").unwrap().into_value(),
            json!({"_id": "1", "x": 1, "y": 2})
        );
    }

    #[test]
    fn reads_single_diff_object() {
        let dir = TempDir::new().unwrap();
        let diff_path = dir.path().join("diff.json");
        fs::write(&diff_path, r#"{"_id": "7", "delete": ["old"]}"#).unwrap();
        let diffs = read_diffs(&diff_path).unwrap();
        assert_eq!(diffs, vec![Diff::new("7").with_delete("old")]);
    }
}
