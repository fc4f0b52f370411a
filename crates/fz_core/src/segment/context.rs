//! Allocation capability bound to one segment.

use crate::error::{CoreError, CoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The allocation context of one segment.
///
/// Every container built inside a segment holds an `Arc<SegmentContext>`
/// and charges its footprint against the segment's byte budget. Two stores
/// built from the same context agree on their segment without consulting
/// any global state.
#[derive(Debug)]
pub struct SegmentContext {
    name: String,
    budget: Option<u64>,
    used: AtomicU64,
}

impl SegmentContext {
    /// Creates a context with a byte budget.
    #[must_use]
    pub fn bounded(name: impl Into<String>, budget: u64) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            budget: Some(budget),
            used: AtomicU64::new(0),
        })
    }

    /// Creates an unbounded context that belongs to no manager.
    ///
    /// Used for stores that live only in the current process heap, such as
    /// stores built by loaders and tests.
    #[must_use]
    pub fn heap(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            budget: None,
            used: AtomicU64::new(0),
        })
    }

    /// Segment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Byte budget, `None` when unbounded.
    #[must_use]
    pub const fn budget(&self) -> Option<u64> {
        self.budget
    }

    /// Bytes charged so far.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Bytes still available (`u64::MAX` when unbounded).
    #[must_use]
    pub fn available(&self) -> u64 {
        self.budget
            .map_or(u64::MAX, |budget| budget.saturating_sub(self.used()))
    }

    /// Charges `bytes` against the budget.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SegmentExhausted`] if the budget would be
    /// exceeded; nothing is charged in that case.
    pub fn charge(&self, bytes: u64) -> CoreResult<()> {
        let Some(budget) = self.budget else {
            self.used.fetch_add(bytes, Ordering::Relaxed);
            return Ok(());
        };
        self.used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                used.checked_add(bytes).filter(|total| *total <= budget)
            })
            .map(|_| ())
            .map_err(|used| CoreError::SegmentExhausted {
                name: self.name.clone(),
                requested: bytes,
                available: budget.saturating_sub(used),
            })
    }

    /// Returns `bytes` to the budget.
    pub fn release(&self, bytes: u64) {
        // saturating, a release never underflows
        let _ = self
            .used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                Some(used.saturating_sub(bytes))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_context_is_unbounded() {
        let ctx = SegmentContext::heap("scratch");
        ctx.charge(u64::MAX / 2).unwrap();
        assert_eq!(ctx.available(), u64::MAX);
        assert_eq!(ctx.name(), "scratch");
    }

    #[test]
    fn bounded_context_refuses_overcharge() {
        let ctx = SegmentContext::bounded("graph", 100);
        ctx.charge(60).unwrap();

        let err = ctx.charge(50).unwrap_err();
        assert!(matches!(
            err,
            CoreError::SegmentExhausted {
                requested: 50,
                available: 40,
                ..
            }
        ));
        assert_eq!(ctx.used(), 60);
    }

    #[test]
    fn release_returns_budget() {
        let ctx = SegmentContext::bounded("graph", 100);
        ctx.charge(100).unwrap();
        ctx.release(30);
        assert_eq!(ctx.available(), 30);
        ctx.release(1000);
        assert_eq!(ctx.used(), 0);
    }
}
