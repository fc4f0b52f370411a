//! Graph Edges.

use crate::graph::id::{EdgeId, NodeId};

/// Position of a Node in the Entity Store's Node arena.
///
/// The index is relative to the arena, so it stays valid wherever the
/// segment holding the store is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIdx(pub(crate) u32);

impl NodeIdx {
    /// Arena position.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// A dependency relation from one Node (the dependency) to another (the
/// superior).
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub(crate) dep_idx: Option<NodeIdx>,
    pub(crate) sup_idx: Option<NodeIdx>,
    /// How much the superior depends on the dependency.
    pub dependency: f32,
    /// Significance of the relation.
    pub significance: f32,
    /// Importance of the relation.
    pub importance: f32,
    /// Urgency of the relation.
    pub urgency: f32,
    /// Priority of the relation.
    pub priority: f32,
}

impl Edge {
    /// Creates an unregistered Edge between two Node ids.
    #[must_use]
    pub fn new(dep: NodeId, sup: NodeId) -> Self {
        Self {
            id: EdgeId::new(dep, sup),
            dep_idx: None,
            sup_idx: None,
            dependency: 0.0,
            significance: 0.0,
            importance: 0.0,
            urgency: 0.0,
            priority: 0.0,
        }
    }

    /// Edge id.
    #[must_use]
    pub const fn id(&self) -> EdgeId {
        self.id
    }

    /// Dependency Node id.
    #[must_use]
    pub const fn dep(&self) -> NodeId {
        self.id.dep()
    }

    /// Superior Node id.
    #[must_use]
    pub const fn sup(&self) -> NodeId {
        self.id.sup()
    }

    /// Arena position of the dependency, once registered.
    #[must_use]
    pub const fn dep_idx(&self) -> Option<NodeIdx> {
        self.dep_idx
    }

    /// Arena position of the superior, once registered.
    #[must_use]
    pub const fn sup_idx(&self) -> Option<NodeIdx> {
        self.sup_idx
    }

    pub(crate) fn footprint(&self) -> u64 {
        // the edge plus one cache slot in each endpoint
        (std::mem::size_of::<Self>() + 2 * std::mem::size_of::<EdgeId>()) as u64
    }
}
