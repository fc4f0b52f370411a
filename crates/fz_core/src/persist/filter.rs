//! Selection of a partial Log load.

use crate::error::{CoreError, CoreResult};
use crate::graph::NodeId;
use crate::timekey::TimeKey;

/// What [`crate::BackingStore::load_partial_log`] reads.
///
/// Bounds are inclusive and compare chunk ids, so an entry is selected
/// through the chunk its key names. `None` leaves a bound open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogFilter {
    /// Earliest chunk to read.
    pub t_from: Option<TimeKey>,
    /// Latest chunk to read.
    pub t_to: Option<TimeKey>,
    /// Read only the history of this Node.
    pub node: Option<NodeId>,
    /// Maximum number of selected chunks (0 = unbounded).
    pub limit: usize,
    /// With a limit, keep the newest chunks instead of the oldest.
    pub back_to_front: bool,
    /// Skip entries.
    pub chunks_only: bool,
}

impl LogFilter {
    /// A filter that selects everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the earliest chunk.
    #[must_use]
    pub const fn from(mut self, t: TimeKey) -> Self {
        self.t_from = Some(t);
        self
    }

    /// Sets the latest chunk.
    #[must_use]
    pub const fn to(mut self, t: TimeKey) -> Self {
        self.t_to = Some(t);
        self
    }

    /// Restricts the load to one Node's history.
    #[must_use]
    pub const fn node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Limits the number of chunks.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Keeps the newest chunks when limited.
    #[must_use]
    pub const fn back_to_front(mut self, value: bool) -> Self {
        self.back_to_front = value;
        self
    }

    /// Skips entries.
    #[must_use]
    pub const fn chunks_only(mut self, value: bool) -> Self {
        self.chunks_only = value;
        self
    }

    /// Checks the filter against the current time.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidFilter`] when `t_from` is after `t_to` or lies in
    /// the future.
    pub fn validate(&self, now: TimeKey) -> CoreResult<()> {
        if let (Some(from), Some(to)) = (self.t_from, self.t_to) {
            if from.chunk_key() > to.chunk_key() {
                return Err(CoreError::invalid_filter(format!(
                    "t_from {from} is after t_to {to}"
                )));
            }
        }
        if let Some(from) = self.t_from {
            if from.chunk_key() > now.chunk_key() {
                return Err(CoreError::invalid_filter(format!(
                    "t_from {from} is in the future"
                )));
            }
        }
        Ok(())
    }

    /// True if `chunk` lies within the bounds.
    #[must_use]
    pub fn admits(&self, chunk: TimeKey) -> bool {
        let chunk = chunk.chunk_key();
        self.t_from.map_or(true, |from| chunk >= from.chunk_key())
            && self.t_to.map_or(true, |to| chunk <= to.chunk_key())
    }

    /// Applies the limit to candidates in ascending order.
    pub(crate) fn take_limited<T>(&self, mut candidates: Vec<T>) -> Vec<T> {
        if self.limit == 0 || candidates.len() <= self.limit {
            return candidates;
        }
        if self.back_to_front {
            candidates.split_off(candidates.len() - self.limit)
        } else {
            candidates.truncate(self.limit);
            candidates
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    #[test]
    fn reversed_bounds_are_refused() {
        let now = key("202501010000");
        let filter = LogFilter::new()
            .from(key("202402010000"))
            .to(key("202401010000"));
        assert!(matches!(
            filter.validate(now),
            Err(CoreError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn future_start_is_refused() {
        let filter = LogFilter::new().from(key("203001010000"));
        assert!(filter.validate(key("202501010000")).is_err());
        assert!(LogFilter::new().validate(key("202501010000")).is_ok());
    }

    #[test]
    fn bounds_are_inclusive() {
        let filter = LogFilter::new()
            .from(key("202401010900"))
            .to(key("202401011000"));
        assert!(filter.admits(key("202401010900")));
        assert!(filter.admits(key("202401011000")));
        assert!(filter.admits(key("202401011000.3")));
        assert!(!filter.admits(key("202401011001")));
        assert!(!filter.admits(key("202401010859")));
    }

    #[test]
    fn limit_picks_from_either_end() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(LogFilter::new().limit(2).take_limited(items.clone()), vec![1, 2]);
        assert_eq!(
            LogFilter::new()
                .limit(2)
                .back_to_front(true)
                .take_limited(items.clone()),
            vec![4, 5]
        );
        assert_eq!(LogFilter::new().take_limited(items.clone()), items);
    }
}
