//! Load command implementation.

use docsync_core::{
    build_backend, BackendOptions, StoreConnectors, FAILURE_REASON_REPORT_LIMIT, SNAPSHOT_EXTENSION,
};
use docsync_store::Document;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Outcome of a load.
#[derive(Debug, Serialize)]
pub struct LoadResult {
    /// Backend name.
    pub backend: String,
    /// Backend kind.
    pub kind: String,
    /// Documents read from the input.
    pub read: usize,
    /// Documents written.
    pub succeeded: u64,
    /// Documents not written.
    pub failed: u64,
    /// Most frequent failure reasons with their counts.
    pub reasons: Vec<(String, u64)>,
    /// Snapshot written on finalize.
    pub snapshot: String,
}

/// Runs the load command.
pub fn run(
    options_path: &Path,
    input: &Path,
    out_dir: &Path,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = load(options_path, input, out_dir)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    if result.failed > 0 {
        return Err(format!("{} of {} documents failed", result.failed, result.read).into());
    }
    Ok(())
}

fn load(
    options_path: &Path,
    input: &Path,
    out_dir: &Path,
) -> Result<LoadResult, Box<dyn std::error::Error>> {
    let options = BackendOptions::from_json_file(options_path)?;
    let connectors = StoreConnectors::new().with_snapshot_dir(out_dir);
    let mut backend = build_backend(&options, &connectors)?;
    backend.prepare()?;

    let docs = read_documents(input)?;
    let read = docs.len();
    debug!(read, input = %input.display(), "documents parsed");

    let mut report = backend.insert(docs)?;
    if let Some(flushed) = backend.finalize()? {
        report.merge(flushed);
    }
    let snapshot = out_dir.join(format!("{}.{SNAPSHOT_EXTENSION}", backend.name()));
    info!(backend = %backend.name(), succeeded = report.succeeded, "load complete");

    Ok(LoadResult {
        backend: backend.name().to_string(),
        kind: backend.kind().to_string(),
        read,
        succeeded: report.succeeded,
        failed: report.failed,
        reasons: report.top_reasons(FAILURE_REASON_REPORT_LIMIT),
        snapshot: snapshot.display().to_string(),
    })
}

/// Parses a JSON array of documents, or one document per non-empty line.
pub fn read_documents(path: &Path) -> Result<Vec<Document>, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    let values: Vec<Value> = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text)?
    } else {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            Document::from_value(value)
                .map_err(|e| Box::<dyn std::error::Error>::from(format!("document {i}: {e}")))
        })
        .collect()
}

fn print_text_output(result: &LoadResult) {
    println!("DocSync Load");
    println!("============");
    println!();
    println!("Backend: {} ({})", result.backend, result.kind);
    println!("Read:      {}", result.read);
    println!("Succeeded: {}", result.succeeded);
    println!("Failed:    {}", result.failed);
    for (reason, count) in &result.reasons {
        println!("  {count:>6}  {reason}");
    }
    println!();
    println!("Snapshot: {}", result.snapshot);
}
