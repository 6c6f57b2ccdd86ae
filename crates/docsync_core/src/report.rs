//! Aggregated outcome of bulk writes.

use crate::error::{BackendError, BackendResult};
use crate::options::FAILURE_REASON_REPORT_LIMIT;
use docsync_store::{DocWriteOutcome, WriteFailure};
use std::collections::HashMap;
use tracing::{info, warn};

/// Per-batch success/failure tally.
///
/// Bulk writes never raise for partial failure. Inspecting the report is the
/// only way to tell "all succeeded" from "some failed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Documents written.
    pub succeeded: u64,
    /// Documents not written.
    pub failed: u64,
    /// Recorded failures. A whole-batch failure is one unattributed entry.
    pub failures: Vec<WriteFailure>,
}

impl BatchReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// A report for a batch where every document was written.
    pub fn all_succeeded(count: u64) -> Self {
        Self {
            succeeded: count,
            ..Self::default()
        }
    }

    /// A report for a batch that failed as a whole.
    pub fn batch_failed(total: u64, reason: impl Into<String>) -> Self {
        Self {
            succeeded: 0,
            failed: total,
            failures: vec![WriteFailure::unattributed(reason)],
        }
    }

    /// Builds a report from per-document outcomes.
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = DocWriteOutcome>) -> Self {
        let mut report = Self::new();
        for outcome in outcomes {
            if outcome.ok {
                report.record_success();
            } else {
                let reason = outcome.reason.unwrap_or_else(|| "unknown".to_string());
                report.record_failure(WriteFailure::new(outcome.id, reason));
            }
        }
        report
    }

    /// Records one written document.
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Records one rejected document.
    pub fn record_failure(&mut self, failure: WriteFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: BatchReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.failures.extend(other.failures);
    }

    /// Returns the number of documents the batch covered.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.failures.is_empty()
    }

    /// Returns the distinct failure reasons with their counts, most frequent
    /// first (ties by reason), truncated to `limit`.
    #[must_use]
    pub fn top_reasons(&self, limit: usize) -> Vec<(String, u64)> {
        let mut counts: HashMap<&str, u64> = HashMap::new();
        for failure in &self.failures {
            *counts.entry(failure.reason.as_str()).or_insert(0) += 1;
        }
        let mut reasons: Vec<(String, u64)> = counts
            .into_iter()
            .map(|(reason, count)| (reason.to_string(), count))
            .collect();
        reasons.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        reasons.truncate(limit);
        reasons
    }

    /// Returns the number of distinct failure reasons.
    #[must_use]
    pub fn distinct_reasons(&self) -> usize {
        self.top_reasons(usize::MAX).len()
    }

    /// Escalates a report with failures into [`BackendError::BatchFailure`].
    ///
    /// # Errors
    ///
    /// Returns `BatchFailure` if any document failed.
    pub fn ensure_clean(self) -> BackendResult<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(BackendError::BatchFailure {
                total: self.total(),
                failed: self.failed,
            })
        }
    }

    /// Logs the tally and the most frequent failure reasons.
    pub fn log_summary(&self, backend: &str) {
        info!(
            backend,
            ok = self.succeeded,
            error = self.failed,
            "batch finished"
        );
        if self.is_clean() {
            return;
        }
        for (reason, count) in self.top_reasons(FAILURE_REASON_REPORT_LIMIT) {
            warn!(backend, %reason, count, "batch failure reason");
        }
        let distinct = self.distinct_reasons();
        if distinct > FAILURE_REASON_REPORT_LIMIT {
            warn!(
                backend,
                omitted = distinct - FAILURE_REASON_REPORT_LIMIT,
                "further failure reasons omitted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_report_is_clean() {
        let report = BatchReport::new();
        assert!(report.is_clean());
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn batch_failed_counts_every_document() {
        let report = BatchReport::batch_failed(5, "store down");
        assert!(!report.is_clean());
        assert_eq!(report.failed, 5);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, None);
    }

    #[test]
    fn from_outcomes_tallies() {
        let report = BatchReport::from_outcomes(vec![
            DocWriteOutcome::accepted("a"),
            DocWriteOutcome::rejected("b", "conflict"),
            DocWriteOutcome::accepted("c"),
        ]);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].id.as_deref(), Some("b"));
    }

    #[test]
    fn top_reasons_sorted_and_truncated() {
        let mut report = BatchReport::new();
        for (id, reason) in [
            ("a", "conflict"),
            ("b", "forbidden"),
            ("c", "conflict"),
            ("d", "too large"),
            ("e", "forbidden"),
            ("f", "conflict"),
        ] {
            report.record_failure(WriteFailure::new(id, reason));
        }

        assert_eq!(
            report.top_reasons(2),
            vec![("conflict".to_string(), 3), ("forbidden".to_string(), 2)]
        );
        assert_eq!(report.distinct_reasons(), 3);
    }

    #[test]
    fn merge_accumulates() {
        let mut report = BatchReport::all_succeeded(3);
        report.merge(BatchReport::batch_failed(2, "down"));
        assert_eq!(report.total(), 5);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 2);
    }

    #[test]
    fn ensure_clean_escalates() {
        assert!(BatchReport::all_succeeded(1).ensure_clean().is_ok());
        let err = BatchReport::batch_failed(4, "down").ensure_clean().unwrap_err();
        assert!(matches!(err, BackendError::BatchFailure { total: 4, failed: 4 }));
    }
}
