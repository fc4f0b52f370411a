//! Per-Node chain cursors.

use crate::graph::NodeId;
use crate::log::ChainTarget;
use std::collections::BTreeMap;

/// Ends and length of one Node's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainCursor {
    pub(crate) head: ChainTarget,
    pub(crate) tail: ChainTarget,
    pub(crate) len: usize,
}

impl ChainCursor {
    pub(crate) const fn start(target: ChainTarget) -> Self {
        Self {
            head: target,
            tail: target,
            len: 1,
        }
    }

    /// Oldest element.
    #[must_use]
    pub const fn head(&self) -> ChainTarget {
        self.head
    }

    /// Newest element.
    #[must_use]
    pub const fn tail(&self) -> ChainTarget {
        self.tail
    }

    /// Number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the chain holds no elements. Cursors start at their head,
    /// so a cursor taken from a threaded index is never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One cursor per Node that owns at least one chunk or entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainIndex {
    cursors: BTreeMap<NodeId, ChainCursor>,
}

impl ChainIndex {
    /// Cursor of `node`'s chain.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<&ChainCursor> {
        self.cursors.get(&node)
    }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> Option<&mut ChainCursor> {
        self.cursors.get_mut(&node)
    }

    pub(crate) fn insert(&mut self, node: NodeId, cursor: ChainCursor) {
        self.cursors.insert(node, cursor);
    }

    /// Number of chained Nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// True before threading.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Chained Nodes with their cursors, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ChainCursor)> + '_ {
        self.cursors.iter().map(|(id, c)| (*id, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_counts_from_its_head() {
        let head = ChainTarget::chunk("202401010900".parse().unwrap(), None);
        let mut cursor = ChainCursor::start(head);
        assert_eq!(cursor.len(), 1);
        assert!(!cursor.is_empty());
        assert_eq!(cursor.head(), cursor.tail());

        cursor.len = 0;
        assert!(cursor.is_empty());
    }
}
