//! Threading of per-Node chains through the Log.

use crate::chain::index::{ChainCursor, ChainIndex};
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::graph::NodeId;
use crate::log::{ChainTarget, LogStore};
use crate::stats::{FailureCounters, FailureSnapshot};
use serde::Serialize;

/// Outcome of [`LogStore::thread_chains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChainReport {
    /// Chunks linked into a chain.
    pub chunks: u64,
    /// Entries with an explicit owner linked into a chain.
    pub entries: u64,
    /// Distinct Nodes chained.
    pub nodes: u64,
    /// Elements refused, by kind.
    pub failures: FailureSnapshot,
}

impl LogStore {
    /// The per-Node chain cursors.
    #[must_use]
    pub fn chains(&self) -> &ChainIndex {
        &self.chains
    }

    /// Links every chunk, and every entry with an explicit owner, into the
    /// chain of its Node, in time order.
    ///
    /// Entries without an owner are left out; they belong to their chunk's
    /// chain only through the chunk. An element that already carries links
    /// is refused and counted as [`CoreError::AlreadyLinked`].
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if chains were threaded before and
    /// not cleared, or [`CoreError::TooManyFailures`] past the allowance in
    /// `config`.
    pub fn thread_chains(&mut self, config: &Config) -> CoreResult<ChainReport> {
        if !self.chains.is_empty() {
            return Err(CoreError::invalid_operation(
                "chains are already threaded, clear them first",
            ));
        }
        let counters = FailureCounters::new();
        let mut chains = ChainIndex::default();
        let mut report = ChainReport::default();

        for ci in 0..self.chunks.len() {
            let owner = self.chunks[ci].node;
            let target = self.chunk_target(ci);
            if self.link(&mut chains, owner, target, &counters, config)? {
                report.chunks += 1;
            }

            for n in 0..self.chunks[ci].entries.len() {
                let key = self.chunks[ci].entries[n];
                let Some(ei) = self.entry_index(key) else {
                    continue;
                };
                let Some(owner) = self.entries[ei].node else {
                    continue;
                };
                let target = self.entry_target(ei);
                if self.link(&mut chains, owner, target, &counters, config)? {
                    report.entries += 1;
                }
            }
        }

        report.nodes = chains.len() as u64;
        report.failures = counters.snapshot();
        self.chains = chains;
        tracing::debug!(
            chunks = report.chunks,
            entries = report.entries,
            nodes = report.nodes,
            "threaded node chains"
        );
        Ok(report)
    }

    /// Removes every chain link so that chains can be threaded again.
    pub fn clear_chains(&mut self) {
        for chunk in &mut self.chunks {
            chunk.node_prev = None;
            chunk.node_next = None;
        }
        for entry in &mut self.entries {
            entry.node_prev = None;
            entry.node_next = None;
        }
        self.chains = ChainIndex::default();
    }

    fn link(
        &mut self,
        chains: &mut ChainIndex,
        owner: NodeId,
        target: ChainTarget,
        counters: &FailureCounters,
        config: &Config,
    ) -> CoreResult<bool> {
        let already = self
            .links_mut(&target)
            .is_some_and(|(prev, next)| prev.is_some() || next.is_some());
        if already {
            counters.tolerate("thread_chains", CoreError::already_linked(target), config)?;
            return Ok(false);
        }

        let Some(cursor) = chains.get_mut(owner) else {
            chains.insert(owner, ChainCursor::start(target));
            return Ok(true);
        };
        let tail = cursor.tail;
        if tail.is_chunk() == target.is_chunk() && tail.key() == target.key() {
            counters.tolerate(
                "thread_chains",
                CoreError::integrity(format!("{target} would link to itself")),
                config,
            )?;
            return Ok(false);
        }
        cursor.tail = target;
        cursor.len += 1;

        if let Some((_, next)) = self.links_mut(&tail) {
            *next = Some(target);
        }
        if let Some((prev, _)) = self.links_mut(&target) {
            *prev = Some(tail);
        }
        Ok(true)
    }

    fn links_mut(
        &mut self,
        target: &ChainTarget,
    ) -> Option<(&mut Option<ChainTarget>, &mut Option<ChainTarget>)> {
        let idx = self.resolve_index(target)?;
        if target.is_chunk() {
            let c = &mut self.chunks[idx];
            Some((&mut c.node_prev, &mut c.node_next))
        } else {
            let e = &mut self.entries[idx];
            Some((&mut e.node_prev, &mut e.node_next))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::log::Entry;
    use crate::segment::SegmentContext;
    use crate::timekey::TimeKey;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    #[test]
    fn chunks_and_owned_entries_are_linked() {
        let a = node("202301010000");
        let b = node("202301010001");
        let mut log = LogStore::new(SegmentContext::heap("test"));
        log.append_chunk(key("202401010900"), a).unwrap();
        log.append_entry(Entry::new(key("202401010900.1"), None, "inherited"))
            .unwrap();
        log.append_entry(Entry::new(key("202401010900.2"), Some(b), "for b"))
            .unwrap();
        log.append_chunk(key("202401011000"), b).unwrap();
        log.append_chunk(key("202401011100"), a).unwrap();

        let report = log.thread_chains(&Config::default()).unwrap();
        assert_eq!(report.chunks, 3);
        assert_eq!(report.entries, 1);
        assert_eq!(report.nodes, 2);
        assert!(report.failures.is_clean());

        let b_chain = log.chains().get(b).unwrap();
        assert_eq!(b_chain.len(), 2);
        assert_eq!(b_chain.head().key(), key("202401010900.2"));
        assert_eq!(b_chain.tail().key(), key("202401011000"));

        let first = log.chunk(key("202401010900")).unwrap();
        assert_eq!(first.node_next().unwrap().key(), key("202401011100"));
        assert!(log.entry(key("202401010900.1")).unwrap().node_next().is_none());
    }

    #[test]
    fn second_run_requires_clear() {
        let a = node("202301010000");
        let mut log = LogStore::new(SegmentContext::heap("test"));
        log.append_chunk(key("202401010900"), a).unwrap();
        log.append_chunk(key("202401011000"), a).unwrap();

        log.thread_chains(&Config::default()).unwrap();
        assert!(log.thread_chains(&Config::default()).is_err());

        log.clear_chains();
        assert!(log.chains().is_empty());
        let report = log.thread_chains(&Config::default()).unwrap();
        assert_eq!(report.chunks, 2);
    }

    #[test]
    fn prelinked_elements_are_refused() {
        let a = node("202301010000");
        let mut log = LogStore::new(SegmentContext::heap("test"));
        log.append_chunk(key("202401010900"), a).unwrap();
        log.append_chunk(key("202401011000"), a).unwrap();
        let stray = ChainTarget::chunk(key("202401010900"), None);
        log.chunk_mut(key("202401011000")).unwrap().node_prev = Some(stray);

        let report = log.thread_chains(&Config::default()).unwrap();
        assert_eq!(report.chunks, 1);
        assert_eq!(report.failures.count(FailureKind::AlreadyLinked), 1);

        let mut log2 = LogStore::new(SegmentContext::heap("test"));
        log2.append_chunk(key("202401010900"), a).unwrap();
        log2.append_chunk(key("202401011000"), a).unwrap();
        log2.append_chunk(key("202401011100"), a).unwrap();
        log2.chunk_mut(key("202401011000")).unwrap().node_prev = Some(stray);
        log2.chunk_mut(key("202401011100")).unwrap().node_prev = Some(stray);
        let err = log2
            .thread_chains(&Config::default().max_bulk_failures(1))
            .unwrap_err();
        assert!(matches!(err, CoreError::TooManyFailures { .. }));
    }
}
