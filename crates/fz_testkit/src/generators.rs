//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys and whole Logs that keep the
//! invariants the Log enforces: unique chunk ids, entries inside existing
//! chunks, minor ids numbered from 1.

use crate::scenarios::owner_key;
use fz_core::{Entry, ListFeatures, LogStore, NodeId, SegmentContext, TimeKey};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Minutes in January 2024, the window generated keys fall into.
pub const WINDOW_MINUTES: u32 = 31 * 24 * 60;

/// The chunk key `minutes` after 2024-01-01 00:00, within January.
pub fn minute_key(minutes: u32) -> TimeKey {
    let minutes = minutes % WINDOW_MINUTES;
    let day = u8::try_from(minutes / (24 * 60) + 1).unwrap_or(1);
    let hour = u8::try_from(minutes / 60 % 24).unwrap_or(0);
    let minute = u8::try_from(minutes % 60).unwrap_or(0);
    TimeKey::chunk(2024, 1, day, hour, minute).expect("valid generated key")
}

/// Strategy for valid chunk keys.
pub fn chunk_key_strategy() -> impl Strategy<Value = TimeKey> {
    (0..WINDOW_MINUTES).prop_map(minute_key)
}

/// Strategy for valid entry keys.
pub fn entry_key_strategy() -> impl Strategy<Value = TimeKey> {
    (chunk_key_strategy(), 1u8..=255).prop_map(|(chunk, minor)| chunk.with_minor(minor))
}

/// Strategy for Named List features.
pub fn list_features_strategy() -> impl Strategy<Value = ListFeatures> {
    (0u8..8).prop_map(ListFeatures::from_bits)
}

/// One planned chunk.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    /// Chunk id.
    pub key: TimeKey,
    /// Owner index into [`LogPlan::owners`].
    pub owner: usize,
    /// Explicit owner index of each entry, in minor-id order.
    pub entries: Vec<Option<usize>>,
}

/// A Log described as data, so that failing cases shrink.
#[derive(Debug, Clone)]
pub struct LogPlan {
    /// Node ids used as owners.
    pub owners: Vec<NodeId>,
    /// Chunks in ascending key order.
    pub chunks: Vec<ChunkPlan>,
}

impl LogPlan {
    /// Builds the Log by appending every chunk and its entries in order.
    pub fn build(&self, context: Arc<SegmentContext>) -> LogStore {
        let mut log = LogStore::new(context);
        for chunk in &self.chunks {
            log.append_chunk(chunk.key, self.owners[chunk.owner])
                .expect("append planned chunk");
            for (i, owner) in chunk.entries.iter().enumerate() {
                let minor = u8::try_from(i + 1).expect("entry count fits a minor id");
                let entry = Entry::new(
                    chunk.key.with_minor(minor),
                    owner.map(|o| self.owners[o]),
                    format!("entry {minor}"),
                );
                log.append_entry(entry).expect("append planned entry");
            }
        }
        log
    }

    /// Node ids that own at least one chunk or entry.
    pub fn active_owners(&self) -> BTreeSet<NodeId> {
        self.chunks
            .iter()
            .flat_map(|c| {
                std::iter::once(c.owner).chain(c.entries.iter().flatten().copied())
            })
            .map(|o| self.owners[o])
            .collect()
    }

    /// Everything `node` owns directly, in time order: its chunks and the
    /// entries that name it explicitly.
    pub fn owned_by(&self, node: NodeId) -> Vec<TimeKey> {
        let mut owned = Vec::new();
        for chunk in &self.chunks {
            if self.owners[chunk.owner] == node {
                owned.push(chunk.key);
            }
            for (i, owner) in chunk.entries.iter().enumerate() {
                if owner.map(|o| self.owners[o]) == Some(node) {
                    let minor = u8::try_from(i + 1).expect("entry count fits a minor id");
                    owned.push(chunk.key.with_minor(minor));
                }
            }
        }
        owned
    }
}

/// Strategy for Logs of up to `max_chunks` chunks among `owners` Nodes,
/// with up to `max_entries` entries per chunk.
pub fn log_plan_strategy(
    owners: usize,
    max_chunks: usize,
    max_entries: usize,
) -> impl Strategy<Value = LogPlan> {
    let owners = owners.max(1);
    let entry = prop::option::weighted(0.4, 0..owners);
    let chunk = (
        0..WINDOW_MINUTES,
        0..owners,
        prop::collection::vec(entry, 0..=max_entries),
    );
    prop::collection::vec(chunk, 0..=max_chunks).prop_map(move |raw| {
        let mut seen = BTreeSet::new();
        let mut chunks: Vec<ChunkPlan> = raw
            .into_iter()
            .filter(|(minutes, _, _)| seen.insert(*minutes))
            .map(|(minutes, owner, entries)| ChunkPlan {
                key: minute_key(minutes),
                owner,
                entries,
            })
            .collect();
        chunks.sort_by_key(|c| c.key);
        LogPlan {
            owners: (0..owners).map(|i| NodeId::new(owner_key(i))).collect(),
            chunks,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::heap_context;

    #[test]
    fn minute_key_wraps_into_january() {
        assert_eq!(minute_key(0).to_string(), "202401010000");
        assert_eq!(minute_key(24 * 60 + 61).to_string(), "202401020101");
        assert_eq!(minute_key(WINDOW_MINUTES), minute_key(0));
    }

    proptest! {
        #[test]
        fn planned_logs_build(plan in log_plan_strategy(3, 12, 4)) {
            let log = plan.build(heap_context("plan"));
            prop_assert_eq!(log.num_chunks(), plan.chunks.len());
            let entries: usize = plan.chunks.iter().map(|c| c.entries.len()).sum();
            prop_assert_eq!(log.num_entries(), entries);
            prop_assert!(log.verify_integrity().is_clean());
        }

        #[test]
        fn entry_keys_are_entries(key in entry_key_strategy()) {
            prop_assert!(key.is_entry());
            prop_assert_eq!(key.chunk_key().with_minor(key.minor()), key);
        }
    }
}
