//! Traversal of threaded chains.

use crate::graph::NodeId;
use crate::log::{ChainTarget, Direction, LogElement, LogStore};

/// Iterator over one Node's chain.
///
/// Stops at the end of the chain, at a link whose target is null or no
/// longer resolves, or after visiting every element of the Log once (a
/// looping chain).
#[derive(Debug, Clone)]
pub struct ChainWalker<'a> {
    log: &'a LogStore,
    next: Option<ChainTarget>,
    direction: Direction,
    budget: usize,
}

impl<'a> ChainWalker<'a> {
    /// Walks from `start` towards newer ([`Direction::OldestFirst`]) or
    /// older elements.
    #[must_use]
    pub fn new(log: &'a LogStore, start: Option<ChainTarget>, direction: Direction) -> Self {
        Self {
            log,
            next: start,
            direction,
            budget: log.num_chunks() + log.num_entries(),
        }
    }
}

impl<'a> Iterator for ChainWalker<'a> {
    type Item = LogElement<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let target = self.next.take().filter(|t| !t.is_null())?;
        if self.budget == 0 {
            tracing::warn!(at = %target, "chain does not terminate");
            return None;
        }
        self.budget -= 1;
        let element = self.log.resolve(&target)?;
        self.next = match self.direction {
            Direction::OldestFirst => element.node_next(),
            Direction::NewestFirst => element.node_prev(),
        };
        Some(element)
    }
}

impl LogStore {
    /// `node`'s chain, oldest first. Empty until chains are threaded.
    #[must_use]
    pub fn chain_of(&self, node: NodeId) -> ChainWalker<'_> {
        let head = self.chains.get(node).map(|c| c.head());
        ChainWalker::new(self, head, Direction::OldestFirst)
    }

    /// `node`'s chain, newest first.
    #[must_use]
    pub fn chain_of_reverse(&self, node: NodeId) -> ChainWalker<'_> {
        let tail = self.chains.get(node).map(|c| c.tail());
        ChainWalker::new(self, tail, Direction::NewestFirst)
    }

    /// The most recent chunk or owned entry of `node`.
    ///
    /// Uses the chain index when threaded, else scans back from the newest
    /// chunk.
    #[must_use]
    pub fn newest_element_of(&self, node: NodeId) -> Option<ChainTarget> {
        if let Some(cursor) = self.chains.get(node) {
            return Some(cursor.tail());
        }
        (0..self.chunks.len())
            .rev()
            .find_map(|ci| self.owned_in_chunk(ci, node).last().copied())
    }

    /// The earliest chunk or owned entry of `node`.
    ///
    /// On a threaded Log this walks back from the newest element while the
    /// previous link is present, its target is not null and it resolves.
    /// Otherwise the Log is scanned from the oldest chunk.
    #[must_use]
    pub fn oldest_element_of(&self, node: NodeId) -> Option<ChainTarget> {
        if self.chains.is_empty() {
            return (0..self.chunks.len())
                .find_map(|ci| self.owned_in_chunk(ci, node).first().copied());
        }
        let mut current = self.newest_element_of(node)?;
        for _ in 0..self.num_chunks() + self.num_entries() {
            let prev = self
                .resolve(&current)
                .and_then(|e| e.node_prev())
                .filter(|p| !p.is_null() && self.resolve(p).is_some());
            match prev {
                Some(p) => current = p,
                None => return Some(current),
            }
        }
        tracing::warn!(node = %node, "chain does not terminate");
        Some(current)
    }

    /// The chunk at `ci` and its entries that belong to `node`, in order.
    fn owned_in_chunk(&self, ci: usize, node: NodeId) -> Vec<ChainTarget> {
        let chunk = &self.chunks[ci];
        let mut owned = Vec::new();
        if chunk.node == node {
            owned.push(self.chunk_target(ci));
        }
        for key in &chunk.entries {
            if let Some(ei) = self.entry_index(*key) {
                if self.entries[ei].node == Some(node) {
                    owned.push(self.entry_target(ei));
                }
            }
        }
        owned
    }
}
