//! Trim command implementation.

use docsync_core::{DocPostProcessor, HomologeneTrim, Snapshot};
use std::path::Path;
use tracing::info;

/// Runs the trim command.
pub fn run(snapshot_path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let processors: Vec<Box<dyn DocPostProcessor>> = vec![Box::new(HomologeneTrim::default())];
    let changed = trim(snapshot_path, &processors, dry_run)?;

    if dry_run {
        println!("[DRY RUN] {} documents would change", changed);
    } else {
        println!("Trimmed {} documents in {:?}", changed, snapshot_path);
    }
    Ok(())
}

fn trim(
    snapshot_path: &Path,
    processors: &[Box<dyn DocPostProcessor>],
    dry_run: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut snapshot = Snapshot::read_from(snapshot_path)?;

    let mut changed = 0;
    for doc in &mut snapshot.documents {
        let mut touched = false;
        for processor in processors {
            touched |= processor.process(doc);
        }
        if touched {
            changed += 1;
        }
    }

    if changed > 0 && !dry_run {
        snapshot.write_to(snapshot_path)?;
        info!(changed, path = %snapshot_path.display(), "snapshot trimmed");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_core::{DocBackend, MemoryBackend};
    use docsync_store::Document;
    use serde_json::json;
    use tempfile::TempDir;

    fn default_chain() -> Vec<Box<dyn DocPostProcessor>> {
        vec![Box::new(HomologeneTrim::default())]
    }

    fn gene_snapshot(dir: &TempDir) -> std::path::PathBuf {
        let mut backend = MemoryBackend::new("genes").with_snapshot_dir(dir.path());
        backend
            .insert(vec![
                Document::from_value(json!({
                    "_id": "1017",
                    "homologene": {"id": 74409, "genes": [[9606, 1017], [9913, 281669], [10090, 12566]]}
                }))
                .unwrap(),
                Document::from_value(json!({"_id": "1018", "symbol": "CDK3"})).unwrap(),
            ])
            .unwrap();
        backend.write_snapshot().unwrap()
    }

    #[test]
    fn trims_and_rewrites() {
        let dir = TempDir::new().unwrap();
        let path = gene_snapshot(&dir);

        assert_eq!(trim(&path, &default_chain(), false).unwrap(), 1);
        let reloaded = MemoryBackend::load_snapshot(&path).unwrap();
        let trimmed = reloaded.get_from_id("1017").unwrap().into_value();
        assert_eq!(trimmed["homologene"]["genes"], json!([[9606, 1017], [10090, 12566]]));

        assert_eq!(trim(&path, &default_chain(), false).unwrap(), 0);
    }

    #[test]
    fn dry_run_leaves_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = gene_snapshot(&dir);
        let before = std::fs::read(&path).unwrap();

        assert_eq!(trim(&path, &default_chain(), true).unwrap(), 1);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
