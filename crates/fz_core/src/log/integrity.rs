//! Structural checks over a Log.

use crate::log::store::LogStore;
use crate::timekey::TimeKey;
use serde::Serialize;

/// True if the entries of a chunk, in chunk order, carry minor ids
/// `1..=k` with no gaps.
#[must_use]
pub fn minor_ids_contiguous(entries: &[TimeKey]) -> bool {
    entries
        .iter()
        .enumerate()
        .all(|(i, key)| usize::from(key.minor()) == i + 1)
}

/// Findings of [`LogStore::verify_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Chunks whose entries are not numbered `1..=k`.
    pub minor_gaps: Vec<TimeKey>,
    /// Entries whose chunk does not exist.
    pub missing_chunks: Vec<TimeKey>,
    /// Entries that exist but are not linked to their chunk.
    pub unlinked_entries: Vec<TimeKey>,
    /// Open chunks other than the newest.
    pub stray_open_chunks: Vec<TimeKey>,
    /// Chain elements that link to themselves.
    pub self_links: Vec<TimeKey>,
}

impl IntegrityReport {
    /// True if nothing was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.minor_gaps.is_empty()
            && self.missing_chunks.is_empty()
            && self.unlinked_entries.is_empty()
            && self.stray_open_chunks.is_empty()
            && self.self_links.is_empty()
    }

    /// Number of findings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.minor_gaps.len()
            + self.missing_chunks.len()
            + self.unlinked_entries.len()
            + self.stray_open_chunks.len()
            + self.self_links.len()
    }

    /// True if nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }
}

impl LogStore {
    /// Checks the Log for structural problems.
    #[must_use]
    pub fn verify_integrity(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        let newest = self.chunks.len().saturating_sub(1);

        for (i, chunk) in self.chunks.iter().enumerate() {
            if !minor_ids_contiguous(&chunk.entries) {
                report.minor_gaps.push(chunk.id);
            }
            if chunk.is_open() && i != newest {
                report.stray_open_chunks.push(chunk.id);
            }
            let self_linked = [chunk.node_prev, chunk.node_next]
                .into_iter()
                .flatten()
                .any(|t| t.is_chunk() && t.key() == chunk.id);
            if self_linked {
                report.self_links.push(chunk.id);
            }
        }

        for entry in &self.entries {
            if self.chunk_index(entry.chunk_key()).is_none() {
                report.missing_chunks.push(entry.id);
            } else if !entry.is_linked() {
                report.unlinked_entries.push(entry.id);
            }
            let self_linked = [entry.node_prev, entry.node_next]
                .into_iter()
                .flatten()
                .any(|t| t.is_entry() && t.key() == entry.id);
            if self_linked {
                report.self_links.push(entry.id);
            }
        }

        if !report.is_clean() {
            tracing::warn!(findings = report.len(), "log integrity check failed");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::log::{Chunk, ChainTarget, Entry};
    use crate::segment::SegmentContext;
    use proptest::prelude::*;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    fn owner() -> NodeId {
        "202301010000".parse().unwrap()
    }

    proptest! {
        #[test]
        fn contiguity_distinguishes_misnumbered_chunks(k in 1usize..40, skip in 0usize..40) {
            let base = key("202401010900");
            let good: Vec<TimeKey> = (1..=k).map(|m| base.with_minor(m as u8)).collect();
            prop_assert!(minor_ids_contiguous(&good));

            // renumber one entry past the end to open a gap
            let mut bad = good.clone();
            let at = skip % k;
            bad[at] = base.with_minor((k + 1) as u8);
            bad.sort();
            prop_assert!(!minor_ids_contiguous(&bad));
        }
    }

    #[test]
    fn empty_chunk_is_contiguous() {
        assert!(minor_ids_contiguous(&[]));
    }

    #[test]
    fn clean_log_passes() {
        let mut log = LogStore::new(SegmentContext::heap("test"));
        log.append_chunk(key("202401010900"), owner()).unwrap();
        log.append_entry(Entry::new(key("202401010900.1"), None, "a"))
            .unwrap();
        log.append_entry(Entry::new(key("202401010900.2"), None, "b"))
            .unwrap();
        assert!(log.verify_integrity().is_clean());
    }

    #[test]
    fn problems_are_reported() {
        let mut log = LogStore::new(SegmentContext::heap("test"));
        log.insert_chunk(Chunk::new(key("202401010900"), owner()))
            .unwrap();
        log.insert_chunk(Chunk::new(key("202401011000"), owner()))
            .unwrap();
        log.append_entry(Entry::new(key("202401010900.2"), None, "gap"))
            .unwrap();
        log.insert_unlinked_entry(Entry::new(key("202401020900.1"), None, "lost"))
            .unwrap();
        log.insert_unlinked_entry(Entry::new(key("202401011000.1"), None, "loose"))
            .unwrap();
        let id = key("202401011000");
        log.chunk_mut(id).unwrap().node_next = Some(ChainTarget::chunk(id, None));

        let report = log.verify_integrity();
        assert_eq!(report.minor_gaps, vec![key("202401010900")]);
        assert_eq!(report.stray_open_chunks, vec![key("202401010900")]);
        assert_eq!(report.missing_chunks, vec![key("202401020900.1")]);
        assert_eq!(report.unlinked_entries, vec![key("202401011000.1")]);
        assert_eq!(report.self_links, vec![id]);
        assert_eq!(report.len(), 5);
    }
}
