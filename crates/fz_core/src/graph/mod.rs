//! Entity Graph: Nodes, Edges, Topics and Named Lists.
//!
//! [`EntityStore`] is the registry. Nodes are identified by [`NodeId`]
//! (a [`crate::TimeKey`]), Edges by the ([`NodeId`], [`NodeId`]) pair in
//! [`EdgeId`].

mod compare;
mod edge;
mod edit;
mod id;
mod named_list;
mod node;
mod store;
mod topic;

pub use compare::identical_graphs;
pub use edge::{Edge, NodeIdx};
pub use edit::{EdgeData, EditFlags, NodeData};
pub use id::{EdgeId, NodeId};
pub use named_list::{ListFeatures, ListInsert, NamedList};
pub use node::{CompletionState, Node, TdPattern, TdProperty, TARGETDATE_UNSPECIFIED};
pub use store::{EffectiveTargetDate, EntityStore, GraphErrorCode, GraphRecord};
pub use topic::{Keyword, Topic, Topics};
