//! Log entries.

use crate::graph::NodeId;
use crate::log::target::{ChainTarget, Slot};
use crate::timekey::TimeKey;

/// A single logged note within a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) id: TimeKey,
    pub(crate) node: Option<NodeId>,
    pub(crate) text: String,
    /// Position of the parent chunk once attached; `None` while unlinked.
    pub(crate) chunk: Option<Slot>,
    pub(crate) node_prev: Option<ChainTarget>,
    pub(crate) node_next: Option<ChainTarget>,
}

impl Entry {
    /// Creates an unattached entry.
    #[must_use]
    pub fn new(id: TimeKey, node: Option<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id,
            node,
            text: text.into(),
            chunk: None,
            node_prev: None,
            node_next: None,
        }
    }

    /// Entry id.
    #[must_use]
    pub const fn id(&self) -> TimeKey {
        self.id
    }

    /// Explicit owning Node; `None` means the entry belongs to its chunk's
    /// Node.
    #[must_use]
    pub const fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Text body.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text body.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Id of the chunk this entry belongs to.
    #[must_use]
    pub const fn chunk_key(&self) -> TimeKey {
        self.id.chunk_key()
    }

    /// True once attached to its chunk.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.chunk.is_some()
    }

    /// Previous element of the owning Node's chain.
    #[must_use]
    pub const fn node_prev(&self) -> Option<ChainTarget> {
        self.node_prev
    }

    /// Next element of the owning Node's chain.
    #[must_use]
    pub const fn node_next(&self) -> Option<ChainTarget> {
        self.node_next
    }

    pub(crate) fn footprint(&self) -> u64 {
        (std::mem::size_of::<Self>() + std::mem::size_of::<TimeKey>() + self.text.len()) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_derives_its_chunk() {
        let id: TimeKey = "202401010900.3".parse().unwrap();
        let e = Entry::new(id, None, "note");
        assert_eq!(e.chunk_key().to_string(), "202401010900");
        assert!(!e.is_linked());
        assert!(e.node().is_none());
    }
}
