//! Legacy section boundaries.
//!
//! Breakpoints mark the first chunk of each section of the historical
//! sectioned export format. They carry no meaning for the live store.

use crate::error::{CoreError, CoreResult};
use crate::timekey::TimeKey;
use std::collections::VecDeque;

/// Ordered chunk ids at which sections begin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Breakpoints {
    keys: VecDeque<TimeKey>,
}

impl Breakpoints {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a breakpoint after all existing ones.
    ///
    /// # Errors
    ///
    /// Fails if `chunk` does not come after the last breakpoint.
    pub fn add_later(&mut self, chunk: TimeKey) -> CoreResult<()> {
        if let Some(last) = self.keys.back() {
            if chunk <= *last {
                return Err(CoreError::invalid_operation(format!(
                    "breakpoint {chunk} is not later than {last}"
                )));
            }
        }
        self.keys.push_back(chunk);
        Ok(())
    }

    /// Prepends a breakpoint before all existing ones.
    ///
    /// # Errors
    ///
    /// Fails if `chunk` does not come before the first breakpoint.
    pub fn add_earlier(&mut self, chunk: TimeKey) -> CoreResult<()> {
        if let Some(first) = self.keys.front() {
            if chunk >= *first {
                return Err(CoreError::invalid_operation(format!(
                    "breakpoint {chunk} is not earlier than {first}"
                )));
            }
        }
        self.keys.push_front(chunk);
        Ok(())
    }

    /// Breakpoint `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<TimeKey> {
        self.keys.get(idx).copied()
    }

    /// Number of breakpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if there are no breakpoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Breakpoints in order.
    pub fn iter(&self) -> impl Iterator<Item = TimeKey> + '_ {
        self.keys.iter().copied()
    }

    /// Index of the section `chunk` belongs to: the last breakpoint at or
    /// before it, or 0 when it precedes them all.
    #[must_use]
    pub fn index_before_chunk(&self, chunk: TimeKey) -> Option<usize> {
        if self.keys.is_empty() {
            return None;
        }
        let after = self.keys.partition_point(|k| *k <= chunk);
        Some(after.saturating_sub(1))
    }

    /// `YYYYMMDD` string of breakpoint `idx`, used to name sections.
    #[must_use]
    pub fn ymd_string(&self, idx: usize) -> Option<String> {
        self.get(idx).map(|k| k.ymd_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    #[test]
    fn ordering_is_enforced() {
        let mut bp = Breakpoints::new();
        bp.add_later(key("202401010900")).unwrap();
        bp.add_later(key("202402010900")).unwrap();
        assert!(bp.add_later(key("202401150900")).is_err());
        bp.add_earlier(key("202312010900")).unwrap();
        assert!(bp.add_earlier(key("202401010900")).is_err());
        assert_eq!(bp.len(), 3);
        assert_eq!(bp.get(0), Some(key("202312010900")));
    }

    #[test]
    fn section_lookup() {
        let mut bp = Breakpoints::new();
        assert_eq!(bp.index_before_chunk(key("202401010900")), None);

        bp.add_later(key("202401010900")).unwrap();
        bp.add_later(key("202402010900")).unwrap();

        assert_eq!(bp.index_before_chunk(key("202312010900")), Some(0));
        assert_eq!(bp.index_before_chunk(key("202401010900")), Some(0));
        assert_eq!(bp.index_before_chunk(key("202401200900")), Some(0));
        assert_eq!(bp.index_before_chunk(key("202402010900")), Some(1));
        assert_eq!(bp.index_before_chunk(key("202403010900")), Some(1));
        assert_eq!(bp.ymd_string(1).as_deref(), Some("20240201"));
    }
}
