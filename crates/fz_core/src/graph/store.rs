//! The Entity Store: Node, Edge, Topic and Named List registry.

use crate::config::Config;
use crate::error::{CoreError, CoreResult, RecordKind};
use crate::graph::edge::{Edge, NodeIdx};
use crate::graph::edit::{EditFlags, NodeData};
use crate::graph::id::{EdgeId, NodeId};
use crate::graph::named_list::{ListFeatures, ListInsert, NamedList};
use crate::graph::node::{Node, TdProperty};
use crate::graph::topic::{Topic, Topics};
use crate::segment::SegmentContext;
use crate::stats::{BulkReport, FailureCounters};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Reason code of the most recent Entity Store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphErrorCode {
    /// The last operation succeeded.
    #[default]
    NoErrors,
    /// A null Node was offered.
    AddNullNode,
    /// A Node with the same id exists.
    AddDupNode,
    /// An Edge with a null endpoint was offered.
    AddNullEdge,
    /// An Edge with the same endpoints exists.
    AddDupEdge,
    /// Removal of an Edge with a null endpoint was requested.
    RemoveNullEdge,
    /// Removal of an unknown Edge was requested.
    RemoveUnknownEdge,
    /// Any other failure, such as an Edge endpoint that is not a Node.
    Other,
}

/// A record offered to [`EntityStore::populate`].
#[derive(Debug, Clone)]
pub enum GraphRecord {
    /// A Node.
    Node(Node),
    /// An Edge; its endpoints must already be present.
    Edge(Edge),
    /// A Topic with its stored index.
    Topic(Topic),
    /// A Named List; its members must already be present.
    List(NamedList),
}

/// The effective target date of a Node after inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveTargetDate {
    /// Target date in UNIX seconds, `None` when no date applies.
    pub date: Option<i64>,
    /// The Node the date was taken from.
    pub origin: Option<NodeId>,
}

impl EffectiveTargetDate {
    const NONE: Self = Self {
        date: None,
        origin: None,
    };
}

/// The authoritative Node/Edge/Topic/Named List registry.
///
/// Nodes live in an arena and are never removed; the arena position
/// ([`NodeIdx`]) is the direct reference Edges keep to their endpoints.
/// Edges are ordered by superior, then dependency.
///
/// Every record charges its approximate footprint against the segment
/// context the store was built in.
#[derive(Debug)]
pub struct EntityStore {
    context: Arc<SegmentContext>,
    nodes: Vec<Node>,
    node_index: BTreeMap<NodeId, NodeIdx>,
    edges: BTreeMap<EdgeId, Edge>,
    topics: Topics,
    lists: BTreeMap<String, NamedList>,
    last_error: GraphErrorCode,
    warn_loops: bool,
    high_topic_index_warning: u16,
}

impl EntityStore {
    /// Creates an empty store in `context`.
    #[must_use]
    pub fn new(context: Arc<SegmentContext>) -> Self {
        Self::with_config(context, &Config::default())
    }

    /// Creates an empty store in `context` with settings from `config`.
    #[must_use]
    pub fn with_config(context: Arc<SegmentContext>, config: &Config) -> Self {
        Self {
            context,
            nodes: Vec::new(),
            node_index: BTreeMap::new(),
            edges: BTreeMap::new(),
            topics: Topics::new(),
            lists: BTreeMap::new(),
            last_error: GraphErrorCode::NoErrors,
            warn_loops: config.warn_loops,
            high_topic_index_warning: config.high_topic_index_warning,
        }
    }

    /// The segment context this store allocates from.
    #[must_use]
    pub fn context(&self) -> &Arc<SegmentContext> {
        &self.context
    }

    /// Reason code of the most recent failed operation.
    #[must_use]
    pub const fn last_error(&self) -> GraphErrorCode {
        self.last_error
    }

    fn fail(&mut self, code: GraphErrorCode, err: CoreError) -> CoreError {
        self.last_error = code;
        err
    }

    // === Nodes ===

    /// Creates and registers a Node with default fields.
    ///
    /// # Errors
    ///
    /// [`CoreError::NullKey`] for a null id, [`CoreError::Duplicate`] if the
    /// id exists, or [`CoreError::SegmentExhausted`].
    pub fn create_node(&mut self, id: NodeId) -> CoreResult<&mut Node> {
        self.add_node(Node::new(id))
    }

    /// Registers a Node built elsewhere. Its incident-edge caches are reset.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::create_node`].
    pub fn add_node(&mut self, mut node: Node) -> CoreResult<&mut Node> {
        if node.id.is_null() {
            return Err(self.fail(
                GraphErrorCode::AddNullNode,
                CoreError::NullKey {
                    kind: RecordKind::Node,
                },
            ));
        }
        if self.node_index.contains_key(&node.id) {
            return Err(self.fail(
                GraphErrorCode::AddDupNode,
                CoreError::duplicate(RecordKind::Node, node.id),
            ));
        }
        let idx = u32::try_from(self.nodes.len())
            .map(NodeIdx)
            .map_err(|_| CoreError::invalid_operation("node arena is full"))
            .map_err(|e| self.fail(GraphErrorCode::Other, e))?;
        if let Err(e) = self.context.charge(node.footprint()) {
            return Err(self.fail(GraphErrorCode::Other, e));
        }

        node.sup_edges.clear();
        node.dep_edges.clear();
        self.node_index.insert(node.id, idx);
        self.nodes.push(node);
        self.last_error = GraphErrorCode::NoErrors;
        Ok(&mut self.nodes[idx.get()])
    }

    /// Looks up a Node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|idx| &self.nodes[idx.get()])
    }

    /// Looks up a Node for editing.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = *self.node_index.get(&id)?;
        self.nodes.get_mut(idx.get())
    }

    /// Resolves an arena position.
    #[must_use]
    pub fn node_at(&self, idx: NodeIdx) -> Option<&Node> {
        self.nodes.get(idx.get())
    }

    /// Arena position of a Node.
    #[must_use]
    pub fn node_idx(&self, id: NodeId) -> Option<NodeIdx> {
        self.node_index.get(&id).copied()
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.node_index.values().map(|idx| &self.nodes[idx.get()])
    }

    /// Number of Nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    // === Edges ===

    /// Creates and registers an Edge between two existing Nodes.
    ///
    /// # Errors
    ///
    /// See [`EntityStore::add_edge`].
    pub fn create_edge(&mut self, dep: NodeId, sup: NodeId) -> CoreResult<&mut Edge> {
        self.add_edge(Edge::new(dep, sup))
    }

    /// Registers an Edge and updates both endpoints' incident-edge caches.
    ///
    /// # Errors
    ///
    /// [`CoreError::NullKey`] for a null endpoint, [`CoreError::Duplicate`]
    /// if the pair exists, [`CoreError::UnknownReference`] if an endpoint is
    /// not a registered Node, or [`CoreError::SegmentExhausted`].
    pub fn add_edge(&mut self, mut edge: Edge) -> CoreResult<&mut Edge> {
        let id = edge.id;
        if id.is_null() {
            return Err(self.fail(
                GraphErrorCode::AddNullEdge,
                CoreError::NullKey {
                    kind: RecordKind::Edge,
                },
            ));
        }
        if self.edges.contains_key(&id) {
            return Err(self.fail(
                GraphErrorCode::AddDupEdge,
                CoreError::duplicate(RecordKind::Edge, id),
            ));
        }
        let (Some(dep_idx), Some(sup_idx)) = (self.node_idx(id.dep()), self.node_idx(id.sup()))
        else {
            let missing = if self.node_idx(id.dep()).is_none() {
                id.dep()
            } else {
                id.sup()
            };
            return Err(self.fail(
                GraphErrorCode::Other,
                CoreError::unknown_reference(RecordKind::Node, missing),
            ));
        };
        if let Err(e) = self.context.charge(edge.footprint()) {
            return Err(self.fail(GraphErrorCode::Other, e));
        }

        edge.dep_idx = Some(dep_idx);
        edge.sup_idx = Some(sup_idx);
        self.nodes[dep_idx.get()].sup_edges.insert(id);
        self.nodes[sup_idx.get()].dep_edges.insert(id);
        self.last_error = GraphErrorCode::NoErrors;
        Ok(self.edges.entry(id).or_insert(edge))
    }

    /// Removes an Edge from the registry and from both endpoints' caches.
    ///
    /// # Errors
    ///
    /// [`CoreError::NullKey`] for a null endpoint or
    /// [`CoreError::UnknownReference`] if the Edge is not registered.
    pub fn remove_edge(&mut self, id: EdgeId) -> CoreResult<Edge> {
        if id.is_null() {
            return Err(self.fail(
                GraphErrorCode::RemoveNullEdge,
                CoreError::NullKey {
                    kind: RecordKind::Edge,
                },
            ));
        }
        let Some(edge) = self.edges.remove(&id) else {
            return Err(self.fail(
                GraphErrorCode::RemoveUnknownEdge,
                CoreError::unknown_reference(RecordKind::Edge, id),
            ));
        };
        if let Some(idx) = edge.dep_idx {
            self.nodes[idx.get()].sup_edges.remove(&id);
        }
        if let Some(idx) = edge.sup_idx {
            self.nodes[idx.get()].dep_edges.remove(&id);
        }
        self.context.release(edge.footprint());
        self.last_error = GraphErrorCode::NoErrors;
        Ok(edge)
    }

    /// Looks up an Edge.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Looks up an Edge for editing.
    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&id)
    }

    /// Edges in (superior, dependency) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.values()
    }

    /// Number of Edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Edges whose superior is `sup`, as one contiguous range.
    pub fn dependencies_of(&self, sup: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges
            .range(EdgeId::first_of_superior(sup)..)
            .take_while(move |(id, _)| id.sup() == sup)
            .map(|(_, edge)| edge)
    }

    /// Edges whose dependency is `dep`, via its incident-edge cache.
    pub fn superiors_of(&self, dep: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.node(dep)
            .into_iter()
            .flat_map(|node| node.sup_edges.iter())
            .filter_map(|id| self.edges.get(id))
    }

    // === Topics ===

    /// The Topic registry.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// The Topic registry for editing keywords and titles.
    pub fn topics_mut(&mut self) -> &mut Topics {
        &mut self.topics
    }

    /// Returns the index of the Topic with `tag`, adding it if missing.
    ///
    /// # Errors
    ///
    /// Fails when the index space is exhausted or the segment is full.
    pub fn find_or_add_topic(&mut self, tag: &str, title: &str) -> CoreResult<u16> {
        if let Some(topic) = self.topics.find_by_tag(tag) {
            return Ok(topic.id());
        }
        let footprint = Topic::new(0, tag, title).footprint();
        self.context.charge(footprint)?;
        let (id, _) = self.topics.find_or_add(tag, title).inspect_err(|_| {
            self.context.release(footprint);
        })?;
        if id > self.high_topic_index_warning {
            tracing::warn!(tag, id, "topic index is unusually high");
        }
        Ok(id)
    }

    /// Looks up a Topic by index.
    #[must_use]
    pub fn find_topic_by_id(&self, id: u16) -> Option<&Topic> {
        self.topics.find_by_id(id)
    }

    /// Looks up a Topic by tag.
    #[must_use]
    pub fn find_topic_by_tag(&self, tag: &str) -> Option<&Topic> {
        self.topics.find_by_tag(tag)
    }

    /// Registers a loaded Topic with its stored index.
    ///
    /// # Errors
    ///
    /// See [`Topics::insert`].
    pub fn insert_topic(&mut self, topic: Topic) -> CoreResult<()> {
        let footprint = topic.footprint();
        self.context.charge(footprint)?;
        self.topics
            .insert(topic)
            .inspect_err(|_| self.context.release(footprint))
    }

    // === Target dates ===

    /// Resolves the target date of `id`, inheriting the earliest date of
    /// its superiors where the Node does not carry its own.
    ///
    /// A property that requires a date but has none is treated as
    /// `inherit` when `fixed` and `unspecified` otherwise. Loops among
    /// superiors are cut and warned about.
    #[must_use]
    pub fn effective_targetdate(&self, id: NodeId) -> EffectiveTargetDate {
        let mut visiting = BTreeSet::new();
        self.resolve_targetdate(id, &mut visiting)
    }

    fn resolve_targetdate(
        &self,
        id: NodeId,
        visiting: &mut BTreeSet<NodeId>,
    ) -> EffectiveTargetDate {
        let Some(node) = self.node(id) else {
            return EffectiveTargetDate::NONE;
        };
        if !visiting.insert(id) {
            if self.warn_loops {
                tracing::warn!(node = %id, "loop while resolving inherited target date");
            }
            return EffectiveTargetDate::NONE;
        }

        let mut property = node.tdproperty;
        if !matches!(property, TdProperty::Unspecified | TdProperty::Inherit) && node.targetdate < 0
        {
            property = if property == TdProperty::Fixed {
                TdProperty::Inherit
            } else {
                TdProperty::Unspecified
            };
        }

        let resolved = match property {
            TdProperty::Variable | TdProperty::Fixed | TdProperty::Exact => EffectiveTargetDate {
                date: Some(node.targetdate),
                origin: Some(id),
            },
            TdProperty::Unspecified | TdProperty::Inherit => {
                let mut best = EffectiveTargetDate::NONE;
                for edge_id in &node.sup_edges {
                    let candidate = self.resolve_targetdate(edge_id.sup(), visiting);
                    if let Some(date) = candidate.date {
                        if best.date.map_or(true, |b| date < b) {
                            best = candidate;
                        }
                    }
                }
                best
            }
        };
        visiting.remove(&id);
        resolved
    }

    // === Named Lists ===

    /// Looks up a Named List.
    #[must_use]
    pub fn list(&self, name: &str) -> Option<&NamedList> {
        self.lists.get(name)
    }

    /// Named Lists in name order.
    pub fn lists(&self) -> impl Iterator<Item = &NamedList> + '_ {
        self.lists.values()
    }

    /// Names of all Named Lists.
    pub fn list_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.lists.keys().map(String::as_str)
    }

    /// Creates an empty Named List.
    ///
    /// # Errors
    ///
    /// [`CoreError::Duplicate`] if the name is taken.
    pub fn create_list(
        &mut self,
        name: &str,
        features: ListFeatures,
        maxsize: usize,
    ) -> CoreResult<&mut NamedList> {
        if self.lists.contains_key(name) {
            return Err(CoreError::duplicate(RecordKind::NamedList, name));
        }
        self.context
            .charge((std::mem::size_of::<NamedList>() + name.len()) as u64)?;
        Ok(self
            .lists
            .entry(name.to_string())
            .or_insert_with(|| NamedList::new(name, features, maxsize)))
    }

    /// Adds a Node to a Named List, creating the list with `features` and
    /// `maxsize` if it does not exist.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownReference`] if `node` is not a registered Node.
    pub fn add_to_list(
        &mut self,
        name: &str,
        node: NodeId,
        features: ListFeatures,
        maxsize: usize,
    ) -> CoreResult<ListInsert> {
        if !self.node_index.contains_key(&node) {
            return Err(CoreError::unknown_reference(RecordKind::Node, node));
        }
        if !self.lists.contains_key(name) {
            self.create_list(name, features, maxsize)?;
        }
        self.context.charge(NamedList::footprint_per_member())?;
        let outcome = match self.lists.get_mut(name) {
            Some(list) => list.add(node),
            None => return Err(CoreError::unknown_reference(RecordKind::NamedList, name)),
        };
        if !matches!(outcome, ListInsert::Added) {
            self.context.release(NamedList::footprint_per_member());
        }
        Ok(outcome)
    }

    /// Removes a Node from a Named List. A list left empty is deleted.
    ///
    /// Returns false if the list does not exist or did not hold the Node.
    pub fn remove_from_list(&mut self, name: &str, node: NodeId) -> bool {
        let Some(list) = self.lists.get_mut(name) else {
            return false;
        };
        let before = list.len();
        if !list.remove(node) {
            return false;
        }
        let removed = (before - list.len()) as u64;
        self.context
            .release(removed * NamedList::footprint_per_member());
        if list.is_empty() {
            self.delete_list(name);
        }
        true
    }

    /// Deletes a Named List; returns false if it does not exist.
    pub fn delete_list(&mut self, name: &str) -> bool {
        let Some(list) = self.lists.remove(name) else {
            return false;
        };
        self.context.release(
            (std::mem::size_of::<NamedList>() + name.len()) as u64
                + list.len() as u64 * NamedList::footprint_per_member(),
        );
        true
    }

    /// Copies members of `from` into `to`.
    ///
    /// At most `from_max` members are taken from the front of `from` and
    /// copying stops once `to` holds `to_max` members (0 means no limit for
    /// either). `to` is created with `features` and `maxsize` if missing.
    /// Returns the number of members copied.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownReference`] if `from` does not exist.
    pub fn copy_list_to_list(
        &mut self,
        from: &str,
        to: &str,
        from_max: usize,
        to_max: usize,
        features: ListFeatures,
        maxsize: usize,
    ) -> CoreResult<usize> {
        let Some(source) = self.lists.get(from) else {
            return Err(CoreError::unknown_reference(RecordKind::NamedList, from));
        };
        let take = if from_max == 0 { source.len() } else { from_max };
        let members: Vec<NodeId> = source.iter().take(take).collect();

        let mut copied = 0;
        for node in members {
            if to_max > 0 && self.list(to).map_or(0, NamedList::len) >= to_max {
                break;
            }
            if self.add_to_list(to, node, features, maxsize)?.inserted() {
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Applies a masked edit to every Node in a Named List.
    ///
    /// Each Node is edited whole or not at all. A member whose edit is
    /// refused is counted and skipped, and the remaining members are still
    /// edited. The report's `accepted` is the number of Nodes edited.
    ///
    /// # Errors
    ///
    /// [`CoreError::UnknownReference`] if the list does not exist, and
    /// [`CoreError::TooManyFailures`] once the allowance in `config` is
    /// exceeded. Members edited before the abort stay edited.
    pub fn edit_all_in_list(
        &mut self,
        name: &str,
        flags: EditFlags,
        data: &NodeData,
        config: &Config,
    ) -> CoreResult<BulkReport> {
        let Some(list) = self.lists.get(name) else {
            return Err(CoreError::unknown_reference(RecordKind::NamedList, name));
        };
        let members: BTreeSet<NodeId> = list.iter().collect();
        let counters = FailureCounters::new();
        let (mut processed, mut accepted) = (0, 0);
        for id in members {
            processed += 1;
            let result = match self.node_mut(id) {
                Some(node) => node.apply_edit(flags, data),
                None => Err(CoreError::unknown_reference(RecordKind::Node, id)),
            };
            match result {
                Ok(()) => accepted += 1,
                Err(err) => counters.tolerate("edit list", err, config)?,
            }
        }
        tracing::debug!(list = name, processed, accepted, "list edited");
        Ok(BulkReport::new(processed, accepted, &counters))
    }

    /// Registers a loaded Named List.
    ///
    /// # Errors
    ///
    /// [`CoreError::Duplicate`] if the name is taken or
    /// [`CoreError::UnknownReference`] for a member that is not a Node.
    pub fn insert_list(&mut self, list: NamedList) -> CoreResult<()> {
        if self.lists.contains_key(list.name()) {
            return Err(CoreError::duplicate(RecordKind::NamedList, list.name()));
        }
        if let Some(missing) = list.iter().find(|id| !self.node_index.contains_key(id)) {
            return Err(CoreError::unknown_reference(RecordKind::Node, missing));
        }
        self.context.charge(
            (std::mem::size_of::<NamedList>() + list.name().len()) as u64
                + list.len() as u64 * NamedList::footprint_per_member(),
        )?;
        self.lists.insert(list.name().to_string(), list);
        Ok(())
    }

    // === Bulk ===

    /// Registers records from a data source, counting and skipping
    /// recoverable per-record failures.
    ///
    /// # Errors
    ///
    /// Unrecoverable failures (such as segment exhaustion) abort at once, and
    /// [`CoreError::TooManyFailures`] aborts once the allowance in `config`
    /// is exceeded. Records registered before the abort stay registered.
    pub fn populate<I>(&mut self, records: I, config: &Config) -> CoreResult<BulkReport>
    where
        I: IntoIterator<Item = GraphRecord>,
    {
        let counters = FailureCounters::new();
        let (processed, accepted) = self.populate_counted(records, config, &counters)?;
        Ok(BulkReport::new(processed, accepted, &counters))
    }

    /// [`EntityStore::populate`] with caller-owned counters, so that a
    /// loader can charge damaged rows against the same allowance.
    ///
    /// Returns the records processed and accepted.
    pub(crate) fn populate_counted<I>(
        &mut self,
        records: I,
        config: &Config,
        counters: &FailureCounters,
    ) -> CoreResult<(u64, u64)>
    where
        I: IntoIterator<Item = GraphRecord>,
    {
        let mut processed = 0;
        let mut accepted = 0;
        for record in records {
            processed += 1;
            let result = match record {
                GraphRecord::Node(node) => self.add_node(node).map(|_| ()),
                GraphRecord::Edge(edge) => self.add_edge(edge).map(|_| ()),
                GraphRecord::Topic(topic) => self.insert_topic(topic),
                GraphRecord::List(list) => self.insert_list(list),
            };
            match result {
                Ok(()) => accepted += 1,
                Err(err) => counters.tolerate("populate", err, config)?,
            }
        }
        tracing::debug!(
            processed,
            accepted,
            nodes = self.num_nodes(),
            edges = self.num_edges(),
            "graph populated"
        );
        Ok((processed, accepted))
    }
}
