//! Whole-store snapshots.
//!
//! An image is the row form of a complete Entity Store or Log. Segments
//! publish images so that client processes can locate the stores, and the
//! backing store round-trips through them.

use crate::config::Config;
use crate::error::{CoreError, CoreResult, RecordKind};
use crate::graph::{EntityStore, GraphRecord, Node};
use crate::log::LogStore;
use crate::persist::rows::{ChunkRow, EdgeRow, EntryRow, ListRow, NodeRow, TopicRow};
use crate::segment::SegmentContext;
use crate::stats::{BulkReport, FailureCounters};
use crate::timekey::TimeKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Row form of an Entity Store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphImage {
    pub(crate) topics: Vec<TopicRow>,
    pub(crate) nodes: Vec<NodeRow>,
    pub(crate) edges: Vec<EdgeRow>,
    pub(crate) lists: Vec<ListRow>,
}

impl GraphImage {
    /// Captures `graph`.
    #[must_use]
    pub fn capture(graph: &EntityStore) -> Self {
        Self {
            topics: graph.topics().iter().map(TopicRow::from).collect(),
            nodes: graph.nodes().map(NodeRow::from).collect(),
            edges: graph.edges().map(EdgeRow::from).collect(),
            lists: graph.lists().map(ListRow::from).collect(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len() + self.nodes.len() + self.edges.len() + self.lists.len()
    }

    /// True if the image holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuilds an Entity Store in `context`.
    ///
    /// # Errors
    ///
    /// As [`EntityStore::populate`].
    pub fn restore(
        self,
        context: Arc<SegmentContext>,
        config: &Config,
    ) -> CoreResult<(EntityStore, BulkReport)> {
        let mut graph = EntityStore::with_config(context, config);
        let counters = FailureCounters::new();
        let (processed, accepted) = self.restore_counted(&mut graph, config, &counters)?;
        Ok((graph, BulkReport::new(processed, accepted, &counters)))
    }

    pub(crate) fn restore_counted(
        self,
        graph: &mut EntityStore,
        config: &Config,
        counters: &FailureCounters,
    ) -> CoreResult<(u64, u64)> {
        let mut rejected = 0;
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for row in self.nodes {
            match Node::try_from(row) {
                Ok(node) => nodes.push(GraphRecord::Node(node)),
                Err(err) => {
                    rejected += 1;
                    counters.tolerate("restore graph", err, config)?;
                }
            }
        }
        let records = self
            .topics
            .into_iter()
            .map(|r| GraphRecord::Topic(r.into()))
            .chain(nodes)
            .chain(self.edges.into_iter().map(|r| GraphRecord::Edge(r.into())))
            .chain(self.lists.into_iter().map(|r| GraphRecord::List(r.into())));
        let (processed, accepted) = graph.populate_counted(records, config, counters)?;
        Ok((processed + rejected, accepted))
    }
}

/// Row form of a Log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogImage {
    pub(crate) chunks: Vec<ChunkRow>,
    pub(crate) entries: Vec<EntryRow>,
    pub(crate) breakpoints: Vec<TimeKey>,
}

impl LogImage {
    /// Captures `log`.
    #[must_use]
    pub fn capture(log: &LogStore) -> Self {
        Self {
            chunks: log.chunks().iter().map(ChunkRow::from).collect(),
            entries: log.entries().iter().map(EntryRow::from).collect(),
            breakpoints: log.breakpoints().iter().collect(),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len() + self.entries.len() + self.breakpoints.len()
    }

    /// True if the image holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuilds a Log in `context`. Chains are not threaded.
    ///
    /// # Errors
    ///
    /// Unrecoverable failures and [`CoreError::TooManyFailures`].
    pub fn restore(
        self,
        context: Arc<SegmentContext>,
        config: &Config,
    ) -> CoreResult<(LogStore, BulkReport)> {
        let mut log = LogStore::new(context);
        let counters = FailureCounters::new();
        let (processed, accepted) = self.restore_counted(&mut log, config, &counters)?;
        Ok((log, BulkReport::new(processed, accepted, &counters)))
    }

    pub(crate) fn restore_counted(
        self,
        log: &mut LogStore,
        config: &Config,
        counters: &FailureCounters,
    ) -> CoreResult<(u64, u64)> {
        let mut processed = 0u64;
        let mut accepted = 0u64;

        for row in self.chunks {
            processed += 1;
            match log.insert_chunk(row.into()) {
                Ok(_) => accepted += 1,
                Err(err) => counters.tolerate("restore log", err, config)?,
            }
        }
        for row in self.entries {
            processed += 1;
            match log.insert_unlinked_entry(row.into()) {
                Ok(_) => accepted += 1,
                Err(err) => counters.tolerate("restore log", err, config)?,
            }
        }
        let attach = log.add_entries_to_chunks();
        for orphan in attach.orphans {
            accepted = accepted.saturating_sub(1);
            counters.tolerate(
                "restore log",
                CoreError::unknown_reference(RecordKind::Chunk, orphan.chunk_key()),
                config,
            )?;
        }
        for key in self.breakpoints {
            processed += 1;
            match log.breakpoints_mut().add_later(key) {
                Ok(()) => accepted += 1,
                Err(_) => counters.tolerate(
                    "restore log",
                    CoreError::integrity(format!("breakpoint {key} out of order")),
                    config,
                )?,
            }
        }
        Ok((processed, accepted))
    }
}
