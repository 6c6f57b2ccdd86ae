//! Sequential chunking of id batches.
//!
//! A single `$in` request over a huge id set can exceed a store's payload
//! ceiling. Chunked operations split the ids into `step`-sized slices and
//! issue one request per slice, in order, folding each result into a running
//! total before the next request. A failed chunk aborts the whole call.

use crate::error::{BackendError, BackendResult};
use docsync_store::DocId;
use std::slice::Chunks;
use tracing::debug;

/// Splits `ids` into `step`-sized chunks.
pub(crate) fn checked_chunks(ids: &[DocId], step: usize) -> BackendResult<Chunks<'_, DocId>> {
    if step == 0 {
        return Err(BackendError::invalid_operation("chunk step must be positive"));
    }
    Ok(ids.chunks(step))
}

/// Runs `op` over each chunk and sums the results.
pub(crate) fn sum_chunks<F>(ids: &[DocId], step: usize, what: &'static str, mut op: F) -> BackendResult<u64>
where
    F: FnMut(&[DocId]) -> BackendResult<u64>,
{
    let mut total = 0;
    for (n, chunk) in checked_chunks(ids, step)?.enumerate() {
        total += op(chunk)?;
        debug!(op = what, chunk = n, size = chunk.len(), total, "chunk done");
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<DocId> {
        (0..n).map(|i| i.to_string()).collect()
    }

    #[test]
    fn five_ids_step_two_is_three_chunks() {
        let mut sizes = Vec::new();
        let total = sum_chunks(&ids(5), 2, "count", |chunk| {
            sizes.push(chunk.len());
            Ok(chunk.len() as u64)
        })
        .unwrap();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(total, 5);
    }

    #[test]
    fn zero_step_is_rejected() {
        assert!(matches!(
            checked_chunks(&ids(3), 0),
            Err(BackendError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn empty_ids_make_no_calls() {
        let mut calls = 0;
        let total = sum_chunks(&[], 10, "count", |_| {
            calls += 1;
            Ok(1)
        })
        .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(total, 0);
    }

    #[test]
    fn failed_chunk_aborts() {
        let mut calls = 0;
        let result = sum_chunks(&ids(6), 2, "remove", |_| {
            calls += 1;
            if calls == 2 {
                Err(BackendError::dependency_unavailable("down"))
            } else {
                Ok(2)
            }
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
