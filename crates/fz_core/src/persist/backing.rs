//! The backing store: durable tables the core loads from and flushes to.

use crate::config::Config;
use crate::error::{CoreError, CoreResult, RecordKind};
use crate::graph::EntityStore;
use crate::history::{NodeHistories, NodeHistory};
use crate::log::{Chunk, Entry, LogStore};
use crate::persist::dir::StoreDir;
use crate::persist::filter::LogFilter;
use crate::persist::image::{GraphImage, LogImage};
use crate::persist::manifest::Manifest;
use crate::persist::rows::{ChunkRow, EntryRow, HistoryRow};
use crate::persist::table::{decode_rows, encode_rows, Table};
use crate::segment::SegmentContext;
use crate::stats::{BulkReport, FailureCounters};
use crate::timekey::TimeKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// A backing-store directory opened for reading and writing.
///
/// Every store call replaces whole tables and then rewrites the manifest.
/// Loads read tables into stores built in a caller-supplied
/// [`SegmentContext`]; damaged rows are counted and skipped up to
/// [`Config::max_bulk_failures`].
///
/// # Example
///
/// ```rust,no_run
/// use fz_core::{BackingStore, Config, SegmentContext};
/// use std::path::Path;
///
/// let store = BackingStore::open(Path::new("fz.store"), Config::default())?;
/// let (graph, report) = store.load_graph(SegmentContext::heap("graph"))?;
/// println!("{} nodes, {} failures", graph.num_nodes(), report.failures.total());
/// # Ok::<(), fz_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct BackingStore {
    dir: StoreDir,
    config: Config,
    manifest: Manifest,
}

/// Per-load bookkeeping.
struct Tally<'a> {
    config: &'a Config,
    operation: &'static str,
    counters: FailureCounters,
    processed: u64,
    accepted: u64,
}

impl<'a> Tally<'a> {
    fn new(config: &'a Config, operation: &'static str) -> Self {
        Self {
            config,
            operation,
            counters: FailureCounters::new(),
            processed: 0,
            accepted: 0,
        }
    }

    fn record<T>(&mut self, result: CoreResult<T>) -> CoreResult<()> {
        self.processed += 1;
        match result {
            Ok(_) => {
                self.accepted += 1;
                Ok(())
            }
            Err(err) => self.counters.tolerate(self.operation, err, self.config),
        }
    }

    fn orphans(&mut self, orphans: Vec<Entry>) -> CoreResult<()> {
        for orphan in orphans {
            self.accepted = self.accepted.saturating_sub(1);
            self.counters.tolerate(
                self.operation,
                CoreError::unknown_reference(RecordKind::Chunk, orphan.chunk_key()),
                self.config,
            )?;
        }
        Ok(())
    }

    fn report(&self) -> BulkReport {
        BulkReport::new(self.processed, self.accepted, &self.counters)
    }
}

impl BackingStore {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Errors
    ///
    /// [`CoreError::StoreLocked`] if another process has it open, an
    /// invalid manifest, or I/O errors.
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let manifest = dir.load_manifest()?.unwrap_or_default();
        tracing::info!(path = %path.display(), tables = manifest.tables.len(), "backing store opened");
        Ok(Self {
            dir,
            config,
            manifest,
        })
    }

    /// Store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Current manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Tables ===

    fn write_table<T, I>(&mut self, table: Table, rows: I) -> CoreResult<u64>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let (bytes, count) = encode_rows(rows)?;
        self.dir
            .write_table(table, &bytes, self.config.sync_on_store)?;
        self.manifest.set_rows(table.name(), count);
        Ok(count)
    }

    fn commit(&self) -> CoreResult<()> {
        self.dir.save_manifest(&self.manifest)
    }

    /// Reads a table, charging damaged rows to `tally`.
    fn read_table<T: DeserializeOwned>(&self, table: Table, tally: &mut Tally<'_>) -> CoreResult<Vec<T>> {
        let Some(bytes) = self.dir.read_table(table)? else {
            return Ok(Vec::new());
        };
        let decoded = decode_rows::<T>(table, &bytes)?;
        let seen = (decoded.rows.len() + decoded.damaged.len()) as u64;
        if let Some(expected) = self.manifest.rows(table.name()) {
            if expected != decoded.rows.len() as u64 {
                tracing::warn!(%table, expected, read = decoded.rows.len(), "row count differs from manifest");
            }
        }
        for err in decoded.damaged {
            tally.processed += 1;
            tally.counters.tolerate(tally.operation, err, tally.config)?;
        }
        tracing::debug!(%table, rows = seen, "table read");
        Ok(decoded.rows)
    }

    // === Graph ===

    /// Replaces the graph tables with the content of `graph`.
    ///
    /// # Errors
    ///
    /// Codec, storage and I/O errors.
    pub fn store_graph(&mut self, graph: &EntityStore) -> CoreResult<()> {
        let image = GraphImage::capture(graph);
        let topics = self.write_table(Table::Topics, image.topics)?;
        let nodes = self.write_table(Table::Nodes, image.nodes)?;
        let edges = self.write_table(Table::Edges, image.edges)?;
        let lists = self.write_table(Table::Lists, image.lists)?;
        self.commit()?;
        tracing::info!(topics, nodes, edges, lists, "graph stored");
        Ok(())
    }

    /// Loads the graph tables into a new Entity Store.
    ///
    /// # Errors
    ///
    /// Storage errors, a table without its magic, unrecoverable record
    /// failures and [`CoreError::TooManyFailures`].
    pub fn load_graph(&self, context: Arc<SegmentContext>) -> CoreResult<(EntityStore, BulkReport)> {
        let mut tally = Tally::new(&self.config, "load graph");
        let image = GraphImage {
            topics: self.read_table(Table::Topics, &mut tally)?,
            nodes: self.read_table(Table::Nodes, &mut tally)?,
            edges: self.read_table(Table::Edges, &mut tally)?,
            lists: self.read_table(Table::Lists, &mut tally)?,
        };
        let mut graph = EntityStore::with_config(context, &self.config);
        let (processed, accepted) = image.restore_counted(&mut graph, &self.config, &tally.counters)?;
        tally.processed += processed;
        tally.accepted += accepted;
        tracing::info!(nodes = graph.num_nodes(), edges = graph.num_edges(), "graph loaded");
        Ok((graph, tally.report()))
    }

    // === Log ===

    /// Replaces the log tables with the content of `log`.
    ///
    /// # Errors
    ///
    /// Codec, storage and I/O errors.
    pub fn store_log(&mut self, log: &LogStore) -> CoreResult<()> {
        let image = LogImage::capture(log);
        let chunks = self.write_table(Table::Chunks, image.chunks)?;
        let entries = self.write_table(Table::Entries, image.entries)?;
        let breakpoints = self.write_table(Table::Breakpoints, image.breakpoints)?;
        self.commit()?;
        tracing::info!(chunks, entries, breakpoints, "log stored");
        Ok(())
    }

    /// Loads the whole Log. Chains are not threaded.
    ///
    /// # Errors
    ///
    /// As [`BackingStore::load_graph`].
    pub fn load_log(&self, context: Arc<SegmentContext>) -> CoreResult<(LogStore, BulkReport)> {
        let mut tally = Tally::new(&self.config, "load log");
        let image = LogImage {
            chunks: self.read_table(Table::Chunks, &mut tally)?,
            entries: self.read_table(Table::Entries, &mut tally)?,
            breakpoints: self.read_table(Table::Breakpoints, &mut tally)?,
        };
        let mut log = LogStore::new(context);
        let (processed, accepted) = image.restore_counted(&mut log, &self.config, &tally.counters)?;
        tally.processed += processed;
        tally.accepted += accepted;
        tracing::info!(chunks = log.num_chunks(), entries = log.num_entries(), "log loaded");
        Ok((log, tally.report()))
    }

    /// Loads the part of the Log selected by `filter` into `log`.
    ///
    /// Without a Node constraint this reads the chunks within the bounds
    /// and, unless `chunks_only`, their entries. With a Node it reads the
    /// Node's chunks and the entries it owns, then the chunks that hold
    /// those entries, and finally the remaining entries of every loaded
    /// chunk unless `chunks_only`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidFilter`], and as [`BackingStore::load_graph`].
    pub fn load_partial_log(&self, log: &mut LogStore, filter: &LogFilter) -> CoreResult<BulkReport> {
        filter.validate(TimeKey::now()?)?;
        let mut tally = Tally::new(&self.config, "load partial log");
        let chunk_rows: Vec<ChunkRow> = self.read_table(Table::Chunks, &mut tally)?;
        let entry_rows: Vec<EntryRow> = if filter.chunks_only && filter.node.is_none() {
            Vec::new()
        } else {
            self.read_table(Table::Entries, &mut tally)?
        };

        let Some(node) = filter.node else {
            let selected: Vec<ChunkRow> = filter.take_limited(
                chunk_rows.into_iter().filter(|c| filter.admits(c.id)).collect(),
            );
            let keys: BTreeSet<TimeKey> = selected.iter().map(|c| c.id).collect();
            for row in selected {
                tally.record(log.insert_chunk(row.into()))?;
            }
            if !filter.chunks_only {
                for row in entry_rows.into_iter().filter(|e| keys.contains(&e.id.chunk_key())) {
                    tally.record(log.insert_unlinked_entry(row.into()))?;
                }
                tally.orphans(log.add_entries_to_chunks().orphans)?;
            }
            tracing::debug!(chunks = log.num_chunks(), entries = log.num_entries(), "partial log loaded");
            return Ok(tally.report());
        };

        // the Node's own chunks and entries
        let owned: Vec<ChunkRow> = filter.take_limited(
            chunk_rows
                .iter()
                .filter(|c| c.node == node && filter.admits(c.id))
                .cloned()
                .collect(),
        );
        for row in owned {
            tally.record(log.insert_chunk(row.into()))?;
        }
        let (owned_entries, other_entries): (Vec<EntryRow>, Vec<EntryRow>) = entry_rows
            .into_iter()
            .partition(|e| e.node == Some(node) && filter.admits(e.id));

        // chunks of other Nodes that hold entries of this one
        let surrounding: BTreeSet<TimeKey> = owned_entries.iter().map(|e| e.id.chunk_key()).collect();
        let merged = log.merge_chunks(
            chunk_rows
                .into_iter()
                .filter(|c| surrounding.contains(&c.id))
                .map(Chunk::from),
        )?;
        let pruned = log.prune_duplicate_chunks();
        tracing::debug!(merged, pruned, "surrounding chunks merged");

        if !filter.chunks_only {
            let loaded: BTreeSet<TimeKey> = log.chunks().iter().map(Chunk::id).collect();
            for row in owned_entries {
                tally.record(log.insert_unlinked_entry(row.into()))?;
            }
            for row in other_entries
                .into_iter()
                .filter(|e| loaded.contains(&e.id.chunk_key()))
            {
                tally.record(log.insert_unlinked_entry(row.into()))?;
            }
            tally.orphans(log.add_entries_to_chunks().orphans)?;
        }
        tracing::debug!(%node, chunks = log.num_chunks(), entries = log.num_entries(), "node log loaded");
        Ok(tally.report())
    }

    // === Node histories ===

    /// Replaces the history cache.
    ///
    /// # Errors
    ///
    /// Codec, storage and I/O errors.
    pub fn store_node_histories(&mut self, histories: &NodeHistories) -> CoreResult<()> {
        let rows = histories.iter().map(|(node, history)| HistoryRow {
            node,
            history: history.clone(),
        });
        let count = self.write_table(Table::Histories, rows)?;
        self.commit()?;
        tracing::info!(nodes = count, "node histories stored");
        Ok(())
    }

    /// Loads the history cache.
    ///
    /// # Errors
    ///
    /// As [`BackingStore::load_graph`].
    pub fn load_node_histories(&self) -> CoreResult<(NodeHistories, BulkReport)> {
        let mut tally = Tally::new(&self.config, "load node histories");
        let rows: Vec<HistoryRow> = self.read_table(Table::Histories, &mut tally)?;
        tally.processed += rows.len() as u64;
        tally.accepted += rows.len() as u64;
        let histories = rows.into_iter().map(|r| (r.node, r.history)).collect();
        Ok((histories, tally.report()))
    }

    /// Loads one Node's history into `log` using the history cache instead
    /// of scanning the chunk and entry tables for ownership.
    ///
    /// The chunks holding the Node's entries are loaded as well. A Node
    /// missing from the cache loads nothing.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidFilter`] when `filter` names no Node, and as
    /// [`BackingStore::load_partial_log`].
    pub fn load_node_history_cached(&self, log: &mut LogStore, filter: &LogFilter) -> CoreResult<BulkReport> {
        let Some(node) = filter.node else {
            return Err(CoreError::invalid_filter("a cached history load needs a node"));
        };
        filter.validate(TimeKey::now()?)?;
        let mut tally = Tally::new(&self.config, "load cached history");
        let history: NodeHistory = self
            .read_table::<HistoryRow>(Table::Histories, &mut tally)?
            .into_iter()
            .find(|r| r.node == node)
            .map(|r| r.history)
            .unwrap_or_default();
        if history.is_empty() {
            tracing::warn!(%node, "node has no cached history");
            return Ok(tally.report());
        }

        let chunk_rows: Vec<ChunkRow> = self.read_table(Table::Chunks, &mut tally)?;
        let selected: Vec<ChunkRow> = filter.take_limited(
            chunk_rows
                .iter()
                .filter(|c| history.chunks.contains(&c.id) && filter.admits(c.id))
                .cloned()
                .collect(),
        );
        for row in selected {
            tally.record(log.insert_chunk(row.into()))?;
        }

        if !filter.chunks_only {
            let entry_rows: Vec<EntryRow> = self.read_table(Table::Entries, &mut tally)?;
            for row in entry_rows
                .into_iter()
                .filter(|e| history.entries.contains(&e.id) && filter.admits(e.id))
            {
                tally.record(log.insert_unlinked_entry(row.into()))?;
            }
            let missing: BTreeSet<TimeKey> = log
                .chunk_keys_from_entries()
                .into_iter()
                .filter(|k| log.chunk(*k).is_none())
                .collect();
            for row in chunk_rows.into_iter().filter(|c| missing.contains(&c.id)) {
                tally.record(log.insert_chunk(row.into()))?;
            }
            tally.orphans(log.add_entries_to_chunks().orphans)?;
        }
        Ok(tally.report())
    }

    /// Rebuilds the history cache from the full Log and stores it.
    ///
    /// # Errors
    ///
    /// As [`BackingStore::load_log`] and [`BackingStore::store_node_histories`].
    pub fn refresh_node_history_cache(&mut self, context: Arc<SegmentContext>) -> CoreResult<NodeHistories> {
        let (log, _) = self.load_log(context)?;
        let histories = NodeHistories::build(&log);
        self.store_node_histories(&histories)?;
        Ok(histories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{identical_graphs, ListFeatures, NodeId, TdProperty};
    use crate::persist::table::TABLE_MAGIC;
    use crate::error::FailureKind;
    use crate::frame::{Frame, FrameKind};
    use tempfile::tempdir;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn config() -> Config {
        Config::default().sync_on_store(false)
    }

    /// A owns the 09:00 and 11:00 chunks, B the 10:00 chunk. B's chunk holds
    /// an entry owned by A.
    fn sample_log() -> LogStore {
        let (a, b) = (node("202301010000"), node("202301010001"));
        let mut log = LogStore::new(SegmentContext::heap("log"));
        log.append_chunk(key("202401010900"), a).unwrap();
        log.append_entry(Entry::new(key("202401010900.1"), None, "a1")).unwrap();
        log.append_chunk(key("202401011000"), b).unwrap();
        log.append_entry(Entry::new(key("202401011000.1"), None, "b1")).unwrap();
        log.append_entry(Entry::new(key("202401011000.2"), Some(a), "a in b")).unwrap();
        log.append_chunk(key("202401011100"), a).unwrap();
        log.breakpoints_mut().add_later(key("202401010900")).unwrap();
        log
    }

    #[test]
    fn graph_store_then_load() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();

        let mut graph = EntityStore::new(SegmentContext::heap("g"));
        let topic = graph.find_or_add_topic("work", "Work").unwrap();
        let (a, b) = (node("202401010900"), node("202401010901"));
        graph.create_node(a).unwrap().add_topic(topic, 1.0);
        graph.create_node(b).unwrap().add_topic(topic, 1.0);
        graph.create_edge(a, b).unwrap();
        graph.add_to_list("inbox", b, ListFeatures::FIFO, 10).unwrap();
        store.store_graph(&graph).unwrap();
        assert_eq!(store.manifest().rows("nodes"), Some(2));

        let (loaded, report) = store.load_graph(SegmentContext::heap("g2")).unwrap();
        assert_eq!(report.accepted, 5);
        identical_graphs(&graph, &loaded).unwrap();
    }

    #[test]
    fn repeating_variable_node_row_is_rejected_on_load() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();

        let mut graph = EntityStore::new(SegmentContext::heap("g"));
        graph.create_node(node("202401010900")).unwrap();
        graph.create_node(node("202401010901")).unwrap();
        let mut image = GraphImage::capture(&graph);
        image.nodes[0].tdproperty = TdProperty::Variable;
        image.nodes[0].repeats = true;
        store.write_table(Table::Nodes, image.nodes).unwrap();
        store.commit().unwrap();

        let (loaded, report) = store.load_graph(SegmentContext::heap("g2")).unwrap();
        assert_eq!(loaded.num_nodes(), 1);
        assert_eq!(report.processed, 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.failures.count(FailureKind::Integrity), 1);
        assert!(loaded.nodes().all(|n| !n.repeats()));
    }

    #[test]
    fn manifest_survives_reopen() {
        let temp = tempdir().unwrap();
        {
            let mut store = BackingStore::open(temp.path(), config()).unwrap();
            store.store_log(&sample_log()).unwrap();
        }
        let store = BackingStore::open(temp.path(), config()).unwrap();
        assert_eq!(store.manifest().rows("chunks"), Some(3));
        assert_eq!(store.manifest().rows("entries"), Some(3));
    }

    #[test]
    fn log_store_then_load() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();
        let log = sample_log();
        store.store_log(&log).unwrap();

        let (loaded, report) = store.load_log(SegmentContext::heap("l2")).unwrap();
        assert!(report.failures.is_clean());
        assert_eq!(LogImage::capture(&loaded), LogImage::capture(&log));
        assert_eq!(loaded.entries_of_chunk(key("202401011000")).count(), 2);
    }

    #[test]
    fn partial_load_by_time() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();
        store.store_log(&sample_log()).unwrap();

        let mut log = LogStore::new(SegmentContext::heap("p"));
        let filter = LogFilter::new()
            .from(key("202401011000"))
            .to(key("202401011100"));
        store.load_partial_log(&mut log, &filter).unwrap();
        assert_eq!(log.num_chunks(), 2);
        assert_eq!(log.num_entries(), 2);

        let mut log = LogStore::new(SegmentContext::heap("p"));
        let filter = LogFilter::new().limit(1).back_to_front(true).chunks_only(true);
        store.load_partial_log(&mut log, &filter).unwrap();
        assert_eq!(log.chunks()[0].id(), key("202401011100"));
        assert_eq!(log.num_entries(), 0);
    }

    #[test]
    fn partial_load_by_node_includes_surrounding_chunks() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();
        store.store_log(&sample_log()).unwrap();

        let mut log = LogStore::new(SegmentContext::heap("n"));
        let filter = LogFilter::new().node(node("202301010000"));
        let report = store.load_partial_log(&mut log, &filter).unwrap();
        assert!(report.failures.is_clean());

        let chunks: Vec<TimeKey> = log.chunks().iter().map(Chunk::id).collect();
        assert_eq!(
            chunks,
            vec![key("202401010900"), key("202401011000"), key("202401011100")]
        );
        // every entry of every loaded chunk
        assert_eq!(log.num_entries(), 3);
        assert!(log.verify_integrity().is_clean());
    }

    #[test]
    fn invalid_filter_is_refused() {
        let temp = tempdir().unwrap();
        let store = BackingStore::open(temp.path(), config()).unwrap();
        let mut log = LogStore::new(SegmentContext::heap("x"));
        let filter = LogFilter::new()
            .from(key("202402010000"))
            .to(key("202401010000"));
        assert!(matches!(
            store.load_partial_log(&mut log, &filter),
            Err(CoreError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn history_cache_round_trip() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();
        store.store_log(&sample_log()).unwrap();

        let histories = store
            .refresh_node_history_cache(SegmentContext::heap("h"))
            .unwrap();
        let (loaded, _) = store.load_node_histories().unwrap();
        assert_eq!(loaded, histories);

        let mut log = LogStore::new(SegmentContext::heap("c"));
        let filter = LogFilter::new().node(node("202301010001"));
        store.load_node_history_cached(&mut log, &filter).unwrap();
        assert_eq!(log.num_chunks(), 1);
        assert_eq!(log.num_entries(), 1);

        let mut log = LogStore::new(SegmentContext::heap("c"));
        let filter = LogFilter::new().node(node("202301010000"));
        store.load_node_history_cached(&mut log, &filter).unwrap();
        assert_eq!(log.num_chunks(), 3);
        assert_eq!(log.num_entries(), 2);

        assert!(store
            .load_node_history_cached(&mut log, &LogFilter::new())
            .is_err());
    }

    #[test]
    fn damaged_rows_are_counted() {
        let temp = tempdir().unwrap();
        let mut store = BackingStore::open(temp.path(), config()).unwrap();
        store.store_log(&sample_log()).unwrap();

        let path = store.dir.table_path(Table::Chunks);
        let mut bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes[..4], TABLE_MAGIC);
        for _ in 0..2 {
            bytes.extend(Frame::new(FrameKind::Row, vec![0xff, 0x00]).encode().unwrap());
        }
        std::fs::write(&path, &bytes).unwrap();

        let (log, report) = store.load_log(SegmentContext::heap("d")).unwrap();
        assert_eq!(log.num_chunks(), 3);
        assert_eq!(report.failures.count(FailureKind::Integrity), 2);
        drop(store);

        let strict = BackingStore::open(temp.path(), config().max_bulk_failures(1)).unwrap();
        assert!(matches!(
            strict.load_log(SegmentContext::heap("s")),
            Err(CoreError::TooManyFailures { failures: 2, .. })
        ));
    }
}
