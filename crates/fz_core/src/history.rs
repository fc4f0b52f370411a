//! Node History Index.
//!
//! Maps each Node to the chunks it owns and the entries that belong to it.
//! Unlike the chain threader, entries without an explicit owner count for
//! their chunk's Node here.

use crate::graph::NodeId;
use crate::log::LogStore;
use crate::timekey::TimeKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The chunks and entries recorded for one Node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHistory {
    /// Chunk ids.
    pub chunks: BTreeSet<TimeKey>,
    /// Entry ids, owned or inherited.
    pub entries: BTreeSet<TimeKey>,
}

impl NodeHistory {
    /// True if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.entries.is_empty()
    }
}

/// Histories of every Node that appears in a Log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeHistories {
    histories: BTreeMap<NodeId, NodeHistory>,
}

impl NodeHistories {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index with one pass over chunks and one over entries.
    #[must_use]
    pub fn build(log: &LogStore) -> Self {
        let mut histories: BTreeMap<NodeId, NodeHistory> = BTreeMap::new();
        for chunk in log.chunks() {
            histories
                .entry(chunk.node())
                .or_default()
                .chunks
                .insert(chunk.id());
        }

        let mut unowned = 0usize;
        for entry in log.entries() {
            let owner = entry
                .node()
                .or_else(|| log.chunk(entry.chunk_key()).map(|c| c.node()));
            match owner {
                Some(owner) => {
                    histories.entry(owner).or_default().entries.insert(entry.id());
                }
                None => unowned += 1,
            }
        }
        if unowned > 0 {
            tracing::warn!(unowned, "entries without owner or chunk left out of history");
        }
        Self { histories }
    }

    /// History of `node`.
    #[must_use]
    pub fn history_of(&self, node: NodeId) -> Option<&NodeHistory> {
        self.histories.get(&node)
    }

    /// Replaces the history of `node`.
    pub fn insert(&mut self, node: NodeId, history: NodeHistory) {
        self.histories.insert(node, history);
    }

    /// Number of Nodes with a history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// True if no Node has a history.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Histories in Node id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeHistory)> + '_ {
        self.histories.iter().map(|(id, h)| (*id, h))
    }

    /// Adds to every history the chunks that hold its entries, including
    /// chunks owned by other Nodes.
    ///
    /// Returns the number of chunk ids added.
    pub fn add_surrounding_chunks(&mut self, log: &LogStore) -> usize {
        let mut added = 0;
        for history in self.histories.values_mut() {
            let surrounding: Vec<TimeKey> = history
                .entries
                .iter()
                .map(TimeKey::chunk_key)
                .filter(|k| log.chunk(*k).is_some())
                .collect();
            for key in surrounding {
                if history.chunks.insert(key) {
                    added += 1;
                }
            }
        }
        added
    }
}

impl FromIterator<(NodeId, NodeHistory)> for NodeHistories {
    fn from_iter<I: IntoIterator<Item = (NodeId, NodeHistory)>>(iter: I) -> Self {
        Self {
            histories: iter.into_iter().collect(),
        }
    }
}
