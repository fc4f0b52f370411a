//! Log chunks.

use crate::graph::NodeId;
use crate::log::target::ChainTarget;
use crate::timekey::TimeKey;

/// A contiguous span of logged time attributed to one Node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub(crate) id: TimeKey,
    pub(crate) node: NodeId,
    pub(crate) close: Option<TimeKey>,
    /// Ids of the chunk's entries, in key order.
    pub(crate) entries: Vec<TimeKey>,
    pub(crate) node_prev: Option<ChainTarget>,
    pub(crate) node_next: Option<ChainTarget>,
}

impl Chunk {
    /// Creates an open chunk.
    #[must_use]
    pub fn new(id: TimeKey, node: NodeId) -> Self {
        Self {
            id,
            node,
            close: None,
            entries: Vec::new(),
            node_prev: None,
            node_next: None,
        }
    }

    /// Creates a chunk with a close time (`None` for open).
    #[must_use]
    pub fn with_close(id: TimeKey, node: NodeId, close: Option<TimeKey>) -> Self {
        Self {
            close,
            ..Self::new(id, node)
        }
    }

    /// Chunk id: its start minute.
    #[must_use]
    pub const fn id(&self) -> TimeKey {
        self.id
    }

    /// Owning Node.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Close time, `None` while open.
    #[must_use]
    pub const fn close(&self) -> Option<TimeKey> {
        self.close
    }

    /// True while the chunk is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.close.is_none()
    }

    /// Ids of the chunk's entries in order.
    #[must_use]
    pub fn entries(&self) -> &[TimeKey] {
        &self.entries
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

    /// Minutes from start to close; 0 while open or when either time has
    /// no calendar representation.
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        self.close
            .and_then(|close| TimeKey::minutes_between(&self.id, &close).ok())
            .map_or(0, |m| m.max(0))
    }

    pub(crate) fn footprint() -> u64 {
        std::mem::size_of::<Self>() as u64
    }
}
