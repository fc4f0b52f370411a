//! Per-kind failure counters for bulk operations.
//!
//! Graph population, Log threading and backing-store loads keep going past
//! recoverable per-record failures. Each one is counted here by
//! [`FailureKind`], and the run aborts only once the configured allowance
//! is used up.
//!
//! # Usage
//!
//! ```rust
//! use fz_core::{Config, CoreError, FailureCounters, FailureKind, RecordKind};
//!
//! let counters = FailureCounters::new();
//! let config = Config::default();
//! let err = CoreError::duplicate(RecordKind::Node, "202401010900");
//! counters.tolerate("populate", err, &config).unwrap();
//! assert_eq!(counters.count(FailureKind::Duplicate), 1);
//! ```

use crate::config::Config;
use crate::error::{CoreError, CoreResult, FailureKind};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic failure counters, one per [`FailureKind`].
///
/// Counters can be read while a bulk operation is in progress.
#[derive(Debug, Default)]
pub struct FailureCounters {
    counts: [AtomicU64; FailureKind::ALL.len()],
}

impl FailureCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failure of `kind`.
    pub fn record(&self, kind: FailureKind) {
        self.counts[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the count for `kind`.
    #[must_use]
    pub fn count(&self, kind: FailureKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    /// Returns the total over all kinds.
    #[must_use]
    pub fn total(&self) -> u64 {
        FailureKind::ALL.iter().map(|k| self.count(*k)).sum()
    }

    /// Counts `err` and decides whether the bulk operation may continue.
    ///
    /// # Errors
    ///
    /// Returns `err` itself when it is not recoverable, and
    /// [`CoreError::TooManyFailures`] once the allowance in `config` is
    /// exceeded.
    pub fn tolerate(
        &self,
        operation: &'static str,
        err: CoreError,
        config: &Config,
    ) -> CoreResult<()> {
        self.record(err.kind());
        if !err.is_recoverable() {
            return Err(err);
        }
        tracing::warn!(operation, kind = err.kind().label(), "{err}");
        let failures = self.total();
        if config.exceeds_failure_limit(failures) {
            return Err(CoreError::TooManyFailures {
                operation,
                failures,
            });
        }
        Ok(())
    }

    /// Returns a plain copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> FailureSnapshot {
        let mut snapshot = FailureSnapshot::default();
        for kind in FailureKind::ALL {
            snapshot.counts[kind.index()] = self.count(kind);
        }
        snapshot
    }
}

/// A point-in-time copy of [`FailureCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FailureSnapshot {
    counts: [u64; FailureKind::ALL.len()],
}

impl FailureSnapshot {
    /// Returns the count for `kind`.
    #[must_use]
    pub const fn count(&self, kind: FailureKind) -> u64 {
        self.counts[kind.index()]
    }

    /// Returns the total over all kinds.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero counters with their labels.
    pub fn nonzero(&self) -> impl Iterator<Item = (FailureKind, u64)> + '_ {
        FailureKind::ALL
            .into_iter()
            .map(|kind| (kind, self.count(kind)))
            .filter(|(_, n)| *n > 0)
    }
}

/// Outcome of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BulkReport {
    /// Records offered.
    pub processed: u64,
    /// Records accepted.
    pub accepted: u64,
    /// Failed records by kind.
    pub failures: FailureSnapshot,
}

impl BulkReport {
    /// Builds a report from counters.
    #[must_use]
    pub fn new(processed: u64, accepted: u64, counters: &FailureCounters) -> Self {
        Self {
            processed,
            accepted,
            failures: counters.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecordKind;

    #[test]
    fn default_counters_are_zero() {
        let counters = FailureCounters::new();
        assert_eq!(counters.total(), 0);
        assert!(counters.snapshot().is_clean());
    }

    #[test]
    fn recoverable_failures_are_counted() {
        let counters = FailureCounters::new();
        let config = Config::default();

        counters
            .tolerate("test", CoreError::duplicate(RecordKind::Node, "x"), &config)
            .unwrap();
        counters
            .tolerate(
                "test",
                CoreError::unknown_reference(RecordKind::Chunk, "y"),
                &config,
            )
            .unwrap();

        assert_eq!(counters.count(FailureKind::Duplicate), 1);
        assert_eq!(counters.count(FailureKind::UnknownReference), 1);
        assert_eq!(counters.total(), 2);
    }

    #[test]
    fn unrecoverable_failures_propagate() {
        let counters = FailureCounters::new();
        let result = counters.tolerate("test", CoreError::NoActiveSegment, &Config::default());
        assert!(matches!(result, Err(CoreError::NoActiveSegment)));
        assert_eq!(counters.count(FailureKind::Segment), 1);
    }

    #[test]
    fn allowance_is_enforced() {
        let counters = FailureCounters::new();
        let config = Config::new().max_bulk_failures(1);
        let dup = || CoreError::duplicate(RecordKind::Edge, "a>b");

        counters.tolerate("populate", dup(), &config).unwrap();
        let result = counters.tolerate("populate", dup(), &config);
        assert!(matches!(
            result,
            Err(CoreError::TooManyFailures { failures: 2, .. })
        ));
    }

    #[test]
    fn snapshot_lists_nonzero_kinds() {
        let counters = FailureCounters::new();
        counters.record(FailureKind::AlreadyLinked);
        counters.record(FailureKind::AlreadyLinked);

        let snap = counters.snapshot();
        let nonzero: Vec<_> = snap.nonzero().collect();
        assert_eq!(nonzero, vec![(FailureKind::AlreadyLinked, 2)]);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let counters = Arc::new(FailureCounters::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let c = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    c.record(FailureKind::Storage);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counters.count(FailureKind::Storage), 400);
    }
}
