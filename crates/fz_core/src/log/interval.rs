//! Interval selection and nearest-match search over the Log.
//!
//! Every interval is a half-open range of arena positions. An empty or
//! out-of-range selection is `len..len` for the arena in question, never
//! an error. Key-pair variants report the first and last id in the
//! selection, or a pair of null keys when it is empty.

use crate::error::CoreResult;
use crate::log::store::LogStore;
use crate::timekey::TimeKey;
use std::ops::Range;

/// Which end of the Log an `n`-interval grows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// `n` elements starting at the anchor and moving forward in time.
    #[default]
    OldestFirst,
    /// `n` elements ending at the anchor and moving back in time.
    NewestFirst,
}

fn empty(len: usize) -> Range<usize> {
    len..len
}

fn n_range(len: usize, lower: usize, upper: usize, n: usize, direction: Direction) -> Range<usize> {
    if n == 0 {
        return empty(len);
    }
    let range = match direction {
        Direction::OldestFirst => lower..lower.saturating_add(n).min(len),
        Direction::NewestFirst => upper.saturating_sub(n)..upper,
    };
    if range.is_empty() {
        empty(len)
    } else {
        range
    }
}

impl LogStore {
    /// Chunks from `front` through `back`, both of which must exist.
    #[must_use]
    pub fn chunks_interval(&self, front: TimeKey, back: TimeKey) -> Range<usize> {
        let len = self.num_chunks();
        if back < front {
            return empty(len);
        }
        match (self.chunk_index(front), self.chunk_index(back)) {
            (Some(from), Some(to)) => from..to + 1,
            _ => empty(len),
        }
    }

    /// Chunks with `t_from <= id < t_before`.
    #[must_use]
    pub fn chunks_t_interval(&self, t_from: TimeKey, t_before: TimeKey) -> Range<usize> {
        let len = self.num_chunks();
        let from = self.chunks.partition_point(|c| c.id < t_from);
        let before = self.chunks.partition_point(|c| c.id < t_before);
        if from >= before {
            empty(len)
        } else {
            from..before
        }
    }

    /// Up to `n` chunks starting at the first chunk at or after `t`
    /// ([`Direction::OldestFirst`]) or ending at the last chunk at or before
    /// `t` ([`Direction::NewestFirst`]).
    #[must_use]
    pub fn chunks_n_interval(&self, t: TimeKey, n: usize, direction: Direction) -> Range<usize> {
        let lower = self.chunks.partition_point(|c| c.id < t);
        let upper = self.chunks.partition_point(|c| c.id <= t);
        n_range(self.num_chunks(), lower, upper, n, direction)
    }

    /// First and last chunk id in `range`, or two null keys.
    #[must_use]
    pub fn chunk_key_span(&self, range: Range<usize>) -> (TimeKey, TimeKey) {
        if range.is_empty() {
            return (TimeKey::NULL, TimeKey::NULL);
        }
        match (self.chunks.get(range.start), self.chunks.get(range.end - 1)) {
            (Some(first), Some(last)) => (first.id, last.id),
            _ => (TimeKey::NULL, TimeKey::NULL),
        }
    }

    /// Entries from `front` through `back`, both of which must exist.
    #[must_use]
    pub fn entries_interval(&self, front: TimeKey, back: TimeKey) -> Range<usize> {
        let len = self.num_entries();
        if back < front {
            return empty(len);
        }
        match (self.entry_index(front), self.entry_index(back)) {
            (Some(from), Some(to)) => from..to + 1,
            _ => empty(len),
        }
    }

    /// Entries logged in minutes `t_from <= minute < t_before`.
    ///
    /// Minor ids of the bounds are ignored.
    #[must_use]
    pub fn entries_t_interval(&self, t_from: TimeKey, t_before: TimeKey) -> Range<usize> {
        let len = self.num_entries();
        let lo = t_from.with_minor(0);
        let hi = t_before.with_minor(0);
        let from = self.entries.partition_point(|e| e.id < lo);
        let before = self.entries.partition_point(|e| e.id < hi);
        if from >= before {
            empty(len)
        } else {
            from..before
        }
    }

    /// Up to `n` entries starting at the first entry at or after `anchor`,
    /// or ending at the last entry at or before it.
    #[must_use]
    pub fn entries_n_interval(&self, anchor: TimeKey, n: usize, direction: Direction) -> Range<usize> {
        let lower = self.entries.partition_point(|e| e.id < anchor);
        let upper = self.entries.partition_point(|e| e.id <= anchor);
        n_range(self.num_entries(), lower, upper, n, direction)
    }

    /// First and last entry id in `range`, or two null keys.
    #[must_use]
    pub fn entry_key_span(&self, range: Range<usize>) -> (TimeKey, TimeKey) {
        if range.is_empty() {
            return (TimeKey::NULL, TimeKey::NULL);
        }
        match (self.entries.get(range.start), self.entries.get(range.end - 1)) {
            (Some(first), Some(last)) => (first.id, last.id),
            _ => (TimeKey::NULL, TimeKey::NULL),
        }
    }

    /// The entries that belong to the chunks in `chunks`.
    #[must_use]
    pub fn entries_of_chunks(&self, chunks: Range<usize>) -> Range<usize> {
        let len = self.num_entries();
        let (first, last) = self.chunk_key_span(chunks);
        if first.is_null() {
            return empty(len);
        }
        let from = self.entries.partition_point(|e| e.id < first);
        let before = self.entries.partition_point(|e| e.chunk_key() <= last);
        if from >= before {
            empty(len)
        } else {
            from..before
        }
    }

    /// The chunk starting at `t`, else the nearest later (`later`) or
    /// earlier one.
    #[must_use]
    pub fn find_nearest_key(&self, t: TimeKey, later: bool) -> Option<usize> {
        let t = t.chunk_key();
        match self.chunks.binary_search_by_key(&t, |c| c.id) {
            Ok(i) => Some(i),
            Err(i) if later => (i < self.chunks.len()).then_some(i),
            Err(i) => i.checked_sub(1),
        }
    }

    /// As [`LogStore::find_nearest_key`] for a UNIX time.
    ///
    /// When `t_epoch` has no valid key, `fallback` selects the earliest
    /// chunk instead of failing.
    ///
    /// # Errors
    ///
    /// [`crate::CoreError::InvalidKey`] if `t_epoch` is invalid and
    /// `fallback` is false.
    pub fn find_nearest(&self, t_epoch: i64, later: bool, fallback: bool) -> CoreResult<Option<usize>> {
        match TimeKey::from_epoch(t_epoch, 0) {
            Ok(t) => Ok(self.find_nearest_key(t, later)),
            Err(_) if fallback => Ok((!self.chunks.is_empty()).then_some(0)),
            Err(e) => Err(e.into()),
        }
    }
}
