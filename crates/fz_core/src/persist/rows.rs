//! Row shapes of the backing-store tables.
//!
//! Every record the core keeps has a flat row here. Rows are what gets
//! encoded, so incident-edge caches, chain links and arena positions never
//! reach the backing store.

use crate::error::{CoreError, CoreResult};
use crate::graph::{
    Edge, ListFeatures, NamedList, Node, NodeId, TdPattern, TdProperty, Topic,
};
use crate::history::NodeHistory;
use crate::log::{Chunk, Entry};
use crate::timekey::TimeKey;
use serde::{Deserialize, Serialize};

/// A Node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: NodeId,
    pub topics: Vec<(u16, f32)>,
    pub valuation: f32,
    pub completion: f32,
    pub required: i64,
    pub text: String,
    pub targetdate: i64,
    pub tdproperty: TdProperty,
    pub repeats: bool,
    pub tdpattern: TdPattern,
    pub tdevery: u32,
    pub tdspan: u32,
}

impl From<&Node> for NodeRow {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            topics: node.topics.iter().map(|(k, v)| (*k, *v)).collect(),
            valuation: node.valuation,
            completion: node.completion,
            required: node.required,
            text: node.text.clone(),
            targetdate: node.targetdate,
            tdproperty: node.tdproperty,
            repeats: node.repeats,
            tdpattern: node.tdpattern,
            tdevery: node.tdevery,
            tdspan: node.tdspan,
        }
    }
}

impl TryFrom<NodeRow> for Node {
    type Error = CoreError;

    /// Rebuilds a Node through its setters' checks. A row that repeats
    /// under a property that cannot repeat is an integrity failure.
    fn try_from(row: NodeRow) -> CoreResult<Self> {
        let mut node = Node::new(row.id);
        node.topics = row.topics.into_iter().collect();
        node.valuation = row.valuation;
        node.completion = row.completion;
        node.required = row.required;
        node.text = row.text;
        node.targetdate = row.targetdate;
        node.set_tdproperty(row.tdproperty);
        node.set_repeats(row.repeats).map_err(|_| {
            CoreError::integrity(format!(
                "node {} row repeats with a {:?} target date",
                row.id, row.tdproperty
            ))
        })?;
        node.tdpattern = row.tdpattern;
        node.tdevery = row.tdevery;
        node.tdspan = row.tdspan;
        Ok(node)
    }
}

/// An Edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub dep: NodeId,
    pub sup: NodeId,
    pub dependency: f32,
    pub significance: f32,
    pub importance: f32,
    pub urgency: f32,
    pub priority: f32,
}

impl From<&Edge> for EdgeRow {
    fn from(edge: &Edge) -> Self {
        Self {
            dep: edge.dep(),
            sup: edge.sup(),
            dependency: edge.dependency,
            significance: edge.significance,
            importance: edge.importance,
            urgency: edge.urgency,
            priority: edge.priority,
        }
    }
}

impl From<EdgeRow> for Edge {
    fn from(row: EdgeRow) -> Self {
        let mut edge = Edge::new(row.dep, row.sup);
        edge.dependency = row.dependency;
        edge.significance = row.significance;
        edge.importance = row.importance;
        edge.urgency = row.urgency;
        edge.priority = row.priority;
        edge
    }
}

/// A Topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRow {
    pub id: u16,
    pub supid: Option<u16>,
    pub tag: String,
    pub title: String,
    pub keywords: Vec<(String, f32)>,
}

impl From<&Topic> for TopicRow {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id(),
            supid: topic.supid(),
            tag: topic.tag().to_string(),
            title: topic.title().to_string(),
            keywords: topic
                .keywords()
                .iter()
                .map(|k| (k.text.clone(), k.relevance))
                .collect(),
        }
    }
}

impl From<TopicRow> for Topic {
    fn from(row: TopicRow) -> Self {
        let mut topic = Topic::new(row.id, row.tag, row.title);
        topic.set_supid(row.supid);
        for (text, relevance) in row.keywords {
            topic.add_keyword(text, relevance);
        }
        topic
    }
}

/// A Named List with its members in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub name: String,
    pub features: u8,
    pub maxsize: u64,
    pub members: Vec<NodeId>,
}

impl From<&NamedList> for ListRow {
    fn from(list: &NamedList) -> Self {
        Self {
            name: list.name().to_string(),
            features: list.features().bits(),
            maxsize: list.maxsize() as u64,
            members: list.iter().collect(),
        }
    }
}

impl From<ListRow> for NamedList {
    fn from(row: ListRow) -> Self {
        NamedList::from_members(
            row.name,
            ListFeatures::from_bits(row.features),
            usize::try_from(row.maxsize).unwrap_or(usize::MAX),
            row.members,
        )
    }
}

/// A Log chunk. `close` is `None` while open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: TimeKey,
    pub node: NodeId,
    pub close: Option<TimeKey>,
}

impl From<&Chunk> for ChunkRow {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id(),
            node: chunk.node(),
            close: chunk.close(),
        }
    }
}

impl From<ChunkRow> for Chunk {
    fn from(row: ChunkRow) -> Self {
        Chunk::with_close(row.id, row.node, row.close)
    }
}

/// A Log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    pub id: TimeKey,
    pub node: Option<NodeId>,
    pub text: String,
}

impl From<&Entry> for EntryRow {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id(),
            node: entry.node(),
            text: entry.text().to_string(),
        }
    }
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry::new(row.id, row.node, row.text)
    }
}

/// One Node's cached history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub node: NodeId,
    pub history: NodeHistory,
}
