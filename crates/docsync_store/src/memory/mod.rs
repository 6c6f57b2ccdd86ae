//! In-memory reference drivers.
//!
//! These drivers keep everything in process memory and are suitable for:
//! - Unit and integration tests
//! - Staging runs that should not touch a real store
//!
//! Each driver records how often every primitive was called (see
//! [`CallLog`]) and can be switched into an unavailable state so callers can
//! observe failure handling.

mod collection;
mod connector;
mod index;
mod replica;

pub use collection::InMemoryCollection;
pub use connector::InMemoryConnector;
pub use index::InMemorySearchIndex;
pub use replica::{InMemoryReplicaDb, InMemoryReplicaServer};

use parking_lot::Mutex;
use std::collections::HashMap;

/// Counts driver calls by primitive name.
#[derive(Debug, Default)]
pub struct CallLog {
    counts: Mutex<HashMap<&'static str, usize>>,
}

impl CallLog {
    pub(crate) fn record(&self, op: &'static str) {
        *self.counts.lock().entry(op).or_insert(0) += 1;
    }

    /// Returns how many times `op` was called.
    #[must_use]
    pub fn count(&self, op: &str) -> usize {
        self.counts.lock().get(op).copied().unwrap_or(0)
    }

    /// Forgets all recorded calls.
    pub fn reset(&self) {
        self.counts.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_log_counts_and_resets() {
        let log = CallLog::default();
        log.record("find_in");
        log.record("find_in");
        log.record("count_in");
        assert_eq!(log.count("find_in"), 2);
        assert_eq!(log.count("count_in"), 1);
        assert_eq!(log.count("remove_in"), 0);

        log.reset();
        assert_eq!(log.count("find_in"), 0);
    }
}
