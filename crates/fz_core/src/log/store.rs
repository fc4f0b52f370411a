//! The Temporal Log Store.

use crate::chain::ChainIndex;
use crate::error::{CoreError, CoreResult, KeyError, RecordKind};
use crate::graph::NodeId;
use crate::log::breakpoints::Breakpoints;
use crate::log::chunk::Chunk;
use crate::log::entry::Entry;
use crate::log::target::{ChainTarget, Slot};
use crate::segment::SegmentContext;
use crate::timekey::TimeKey;
use std::ops::Range;
use std::sync::Arc;

/// A resolved chain element.
#[derive(Debug, Clone, Copy)]
pub enum LogElement<'a> {
    /// A chunk.
    Chunk(&'a Chunk),
    /// An entry.
    Entry(&'a Entry),
}

impl<'a> LogElement<'a> {
    /// Identity of the element.
    #[must_use]
    pub fn id(&self) -> TimeKey {
        match self {
            Self::Chunk(c) => c.id,
            Self::Entry(e) => e.id,
        }
    }

    /// Previous element of the owning Node's chain.
    #[must_use]
    pub fn node_prev(&self) -> Option<ChainTarget> {
        match self {
            Self::Chunk(c) => c.node_prev,
            Self::Entry(e) => e.node_prev,
        }
    }

    /// Next element of the owning Node's chain.
    #[must_use]
    pub fn node_next(&self) -> Option<ChainTarget> {
        match self {
            Self::Chunk(c) => c.node_next,
            Self::Entry(e) => e.node_next,
        }
    }

    /// The chunk, if this is one.
    #[must_use]
    pub fn as_chunk(&self) -> Option<&'a Chunk> {
        match self {
            Self::Chunk(c) => Some(c),
            Self::Entry(_) => None,
        }
    }

    /// The entry, if this is one.
    #[must_use]
    pub fn as_entry(&self) -> Option<&'a Entry> {
        match self {
            Self::Entry(e) => Some(e),
            Self::Chunk(_) => None,
        }
    }
}

/// Entries collected before their chunks are known.
///
/// Hand the batch to [`LogStore::attach`] once the chunks are in place.
#[derive(Debug, Default)]
pub struct EntryStaging {
    entries: Vec<Entry>,
}

impl EntryStaging {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the batch.
    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    /// Number of staged entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Entry> for EntryStaging {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Outcome of [`LogStore::add_entries_to_chunks`].
#[derive(Debug, Default)]
pub struct AttachReport {
    /// Entries linked to their chunk.
    pub attached: usize,
    /// Entries whose chunk does not exist. They are no longer in the Log.
    pub orphans: Vec<Entry>,
}

/// Time-ordered chunks and entries plus the legacy breakpoint list.
///
/// Chunks and entries are kept in key-sorted arenas. Positions within
/// them serve as direct references ([`Slot`]); every insertion that is not
/// an append, and every removal, starts a new layout generation so that
/// older slots are recognised as stale.
///
/// Per-Node chains are built on demand by
/// [`LogStore::thread_chains`](crate::LogStore::thread_chains); adding
/// chunks or entries afterwards requires a re-run.
#[derive(Debug)]
pub struct LogStore {
    context: Arc<SegmentContext>,
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) entries: Vec<Entry>,
    breakpoints: Breakpoints,
    generation: u64,
    pub(crate) chains: ChainIndex,
}

impl LogStore {
    /// Creates an empty Log in `context`.
    #[must_use]
    pub fn new(context: Arc<SegmentContext>) -> Self {
        Self {
            context,
            chunks: Vec::new(),
            entries: Vec::new(),
            breakpoints: Breakpoints::new(),
            generation: 0,
            chains: ChainIndex::default(),
        }
    }

    /// The segment context this Log allocates from.
    #[must_use]
    pub fn context(&self) -> &Arc<SegmentContext> {
        &self.context
    }

    /// Current layout generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) {
        self.generation += 1;
    }

    // === Chunks ===

    /// Appends a new open chunk after all existing ones.
    ///
    /// If the newest chunk is still open it is closed at `id`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NullKey`] for a null id or owner,
    /// [`CoreError::InvalidKey`] for an entry key,
    /// [`CoreError::Duplicate`] if the chunk exists,
    /// [`CoreError::InvalidOperation`] if `id` precedes the newest chunk, or
    /// [`CoreError::SegmentExhausted`].
    pub fn append_chunk(&mut self, id: TimeKey, node: NodeId) -> CoreResult<&mut Chunk> {
        check_chunk_key(id)?;
        if node.is_null() {
            return Err(CoreError::NullKey {
                kind: RecordKind::Node,
            });
        }
        if let Some(last) = self.chunks.last() {
            if id == last.id {
                return Err(CoreError::duplicate(RecordKind::Chunk, id));
            }
            if id < last.id {
                return Err(CoreError::invalid_operation(format!(
                    "chunk {id} precedes newest chunk {}",
                    last.id
                )));
            }
        }
        self.context.charge(Chunk::footprint())?;

        if let Some(last) = self.chunks.last_mut() {
            if last.close.is_none() {
                tracing::debug!(chunk = %last.id, close = %id, "closing open chunk");
                last.close = Some(id);
            }
        }
        self.chunks.push(Chunk::new(id, node));
        let idx = self.chunks.len() - 1;
        Ok(&mut self.chunks[idx])
    }

    /// Closes the open chunk at `at`.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidKey`] for an entry key, or
    /// [`CoreError::InvalidOperation`] if there is no open chunk or `at`
    /// precedes its start.
    pub fn close_open_chunk(&mut self, at: TimeKey) -> CoreResult<()> {
        check_chunk_key(at)?;
        let Some(chunk) = self.chunks.last_mut().filter(|c| c.close.is_none()) else {
            return Err(CoreError::invalid_operation("no open chunk"));
        };
        if at < chunk.id {
            return Err(CoreError::invalid_operation(format!(
                "close time {at} precedes chunk start {}",
                chunk.id
            )));
        }
        chunk.close = Some(at);
        Ok(())
    }

    /// The open chunk, if the newest chunk is still open.
    #[must_use]
    pub fn open_chunk(&self) -> Option<&Chunk> {
        self.chunks.last().filter(|c| c.is_open())
    }

    /// Inserts a chunk at its ordered position, as loaders do.
    ///
    /// Its entry list and chain links are reset.
    ///
    /// # Errors
    ///
    /// As [`LogStore::append_chunk`], except that any position is allowed.
    pub fn insert_chunk(&mut self, mut chunk: Chunk) -> CoreResult<usize> {
        check_chunk_key(chunk.id)?;
        let pos = match self.chunk_search(chunk.id) {
            Ok(_) => return Err(CoreError::duplicate(RecordKind::Chunk, chunk.id)),
            Err(pos) => pos,
        };
        self.context.charge(Chunk::footprint())?;

        chunk.entries.clear();
        chunk.node_prev = None;
        chunk.node_next = None;
        if pos != self.chunks.len() {
            self.bump_generation();
        }
        self.chunks.insert(pos, chunk);
        Ok(pos)
    }

    /// Adds chunks without checking for existing ids.
    ///
    /// Chunks with an invalid id are skipped. The arena is re-sorted; a
    /// chunk that collides with an existing one is placed after it and is
    /// removed by [`LogStore::prune_duplicate_chunks`].
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentExhausted`].
    pub fn merge_chunks<I>(&mut self, chunks: I) -> CoreResult<usize>
    where
        I: IntoIterator<Item = Chunk>,
    {
        let mut merged = 0;
        for mut chunk in chunks {
            if let Err(e) = check_chunk_key(chunk.id) {
                tracing::warn!(chunk = %chunk.id, "skipping chunk: {e}");
                continue;
            }
            self.context.charge(Chunk::footprint())?;
            chunk.entries.clear();
            chunk.node_prev = None;
            chunk.node_next = None;
            self.chunks.push(chunk);
            merged += 1;
        }
        if merged > 0 {
            // stable: existing chunks stay ahead of colliding newcomers
            self.chunks.sort_by_key(|c| c.id);
            self.bump_generation();
        }
        Ok(merged)
    }

    /// Removes chunks that share an id with an earlier chunk.
    ///
    /// Returns the number removed.
    pub fn prune_duplicate_chunks(&mut self) -> usize {
        let before = self.chunks.len();
        self.chunks.dedup_by_key(|c| c.id);
        let removed = before - self.chunks.len();
        if removed > 0 {
            tracing::warn!(removed, "pruned duplicate chunks");
            self.context
                .release(Chunk::footprint().saturating_mul(removed as u64));
            self.bump_generation();
        }
        removed
    }

    // === Entries ===

    /// Adds an entry to the Log and links it into its chunk.
    ///
    /// # Errors
    ///
    /// [`CoreError::NullKey`] for a null id,
    /// [`CoreError::InvalidKey`] for a chunk key,
    /// [`CoreError::UnknownReference`] if the chunk does not exist,
    /// [`CoreError::Duplicate`] if the entry exists, or
    /// [`CoreError::SegmentExhausted`].
    pub fn append_entry(&mut self, mut entry: Entry) -> CoreResult<&mut Entry> {
        check_entry_key(entry.id)?;
        let Ok(chunk_idx) = self.chunk_search(entry.chunk_key()) else {
            return Err(CoreError::unknown_reference(
                RecordKind::Chunk,
                entry.chunk_key(),
            ));
        };
        let pos = match self.entry_search(entry.id) {
            Ok(_) => return Err(CoreError::duplicate(RecordKind::Entry, entry.id)),
            Err(pos) => pos,
        };
        self.context.charge(entry.footprint())?;

        if pos != self.entries.len() {
            self.bump_generation();
        }
        let list = &mut self.chunks[chunk_idx].entries;
        if let Err(at) = list.binary_search(&entry.id) {
            list.insert(at, entry.id);
        }
        entry.chunk = Slot::new(chunk_idx, self.generation);
        entry.node_prev = None;
        entry.node_next = None;
        self.entries.insert(pos, entry);
        Ok(&mut self.entries[pos])
    }

    /// Adds an entry without linking it to its chunk.
    ///
    /// Loaders use this when entries may arrive before their chunks;
    /// [`LogStore::add_entries_to_chunks`] completes the link.
    ///
    /// # Errors
    ///
    /// As [`LogStore::append_entry`], except that the chunk need not exist.
    pub fn insert_unlinked_entry(&mut self, mut entry: Entry) -> CoreResult<usize> {
        check_entry_key(entry.id)?;
        let pos = match self.entry_search(entry.id) {
            Ok(_) => return Err(CoreError::duplicate(RecordKind::Entry, entry.id)),
            Err(pos) => pos,
        };
        self.context.charge(entry.footprint())?;

        if pos != self.entries.len() {
            self.bump_generation();
        }
        entry.chunk = None;
        entry.node_prev = None;
        entry.node_next = None;
        self.entries.insert(pos, entry);
        Ok(pos)
    }

    /// Adds every staged entry, one result per entry in staging order.
    pub fn attach(&mut self, staging: EntryStaging) -> Vec<(TimeKey, CoreResult<()>)> {
        staging
            .entries
            .into_iter()
            .map(|entry| {
                let id = entry.id;
                (id, self.append_entry(entry).map(|_| ()))
            })
            .collect()
    }

    /// Links every unlinked entry to the chunk named by its own key.
    ///
    /// Entries without a matching chunk are removed and returned.
    pub fn add_entries_to_chunks(&mut self) -> AttachReport {
        let chunks = &self.chunks;
        let (orphans, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| {
                e.chunk.is_none()
                    && chunks
                        .binary_search_by_key(&e.chunk_key(), |c| c.id)
                        .is_err()
            });
        self.entries = kept;
        if !orphans.is_empty() {
            for orphan in &orphans {
                tracing::warn!(entry = %orphan.id, "entry has no chunk");
                self.context.release(orphan.footprint());
            }
            self.bump_generation();
        }

        let mut attached = 0;
        for entry in &mut self.entries {
            if entry.chunk.is_some() {
                continue;
            }
            let Ok(ci) = self.chunks.binary_search_by_key(&entry.chunk_key(), |c| c.id) else {
                continue;
            };
            let list = &mut self.chunks[ci].entries;
            if let Err(at) = list.binary_search(&entry.id) {
                list.insert(at, entry.id);
            }
            entry.chunk = Slot::new(ci, self.generation);
            attached += 1;
        }
        tracing::debug!(attached, orphans = orphans.len(), "entries attached");
        AttachReport { attached, orphans }
    }

    /// Ids of the chunks that loaded entries belong to.
    #[must_use]
    pub fn chunk_keys_from_entries(&self) -> Vec<TimeKey> {
        let mut keys: Vec<TimeKey> = self.entries.iter().map(Entry::chunk_key).collect();
        keys.dedup();
        keys
    }

    // === Lookup ===

    fn chunk_search(&self, key: TimeKey) -> Result<usize, usize> {
        self.chunks.binary_search_by_key(&key, |c| c.id)
    }

    fn entry_search(&self, key: TimeKey) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&key, |e| e.id)
    }

    /// Arena position of a chunk.
    #[must_use]
    pub fn chunk_index(&self, key: TimeKey) -> Option<usize> {
        self.chunk_search(key).ok()
    }

    /// Arena position of an entry.
    #[must_use]
    pub fn entry_index(&self, key: TimeKey) -> Option<usize> {
        self.entry_search(key).ok()
    }

    /// Looks up a chunk.
    #[must_use]
    pub fn chunk(&self, key: TimeKey) -> Option<&Chunk> {
        self.chunk_index(key).map(|i| &self.chunks[i])
    }

    /// Looks up a chunk for editing.
    pub fn chunk_mut(&mut self, key: TimeKey) -> Option<&mut Chunk> {
        let i = self.chunk_index(key)?;
        self.chunks.get_mut(i)
    }

    /// Looks up an entry.
    #[must_use]
    pub fn entry(&self, key: TimeKey) -> Option<&Entry> {
        self.entry_index(key).map(|i| &self.entries[i])
    }

    /// Looks up an entry for editing.
    pub fn entry_mut(&mut self, key: TimeKey) -> Option<&mut Entry> {
        let i = self.entry_index(key)?;
        self.entries.get_mut(i)
    }

    /// Chunks in key order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Entries in key order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Number of chunks.
    #[must_use]
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of entries.
    #[must_use]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// The entries linked into chunk `key`, in order.
    pub fn entries_of_chunk(&self, key: TimeKey) -> impl Iterator<Item = &Entry> + '_ {
        self.chunk(key)
            .map(|c| c.entries.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|k| self.entry(*k))
    }

    /// The chunk an entry is linked to.
    #[must_use]
    pub fn chunk_of(&self, entry: &Entry) -> Option<&Chunk> {
        let slot = entry.chunk?;
        self.chunk_at_slot(entry.chunk_key(), slot)
            .map(|i| &self.chunks[i])
    }

    fn chunk_at_slot(&self, key: TimeKey, slot: Slot) -> Option<usize> {
        if slot.generation == self.generation
            && self.chunks.get(slot.index()).is_some_and(|c| c.id == key)
        {
            return Some(slot.index());
        }
        self.chunk_index(key)
    }

    fn entry_at_slot(&self, key: TimeKey, slot: Slot) -> Option<usize> {
        if slot.generation == self.generation
            && self.entries.get(slot.index()).is_some_and(|e| e.id == key)
        {
            return Some(slot.index());
        }
        self.entry_index(key)
    }

    /// Arena position of a chain target, preferring its cached slot.
    #[must_use]
    pub fn resolve_index(&self, target: &ChainTarget) -> Option<usize> {
        match *target {
            ChainTarget::Chunk { key, slot: Some(s) } => self.chunk_at_slot(key, s),
            ChainTarget::Chunk { key, slot: None } => self.chunk_index(key),
            ChainTarget::Entry { key, slot: Some(s) } => self.entry_at_slot(key, s),
            ChainTarget::Entry { key, slot: None } => self.entry_index(key),
        }
    }

    /// Resolves a chain target to its chunk or entry.
    #[must_use]
    pub fn resolve(&self, target: &ChainTarget) -> Option<LogElement<'_>> {
        let idx = self.resolve_index(target)?;
        Some(if target.is_chunk() {
            LogElement::Chunk(&self.chunks[idx])
        } else {
            LogElement::Entry(&self.entries[idx])
        })
    }

    /// Chain target for the chunk at `idx`, with a fresh slot.
    pub(crate) fn chunk_target(&self, idx: usize) -> ChainTarget {
        ChainTarget::chunk(self.chunks[idx].id, Slot::new(idx, self.generation))
    }

    /// Chain target for the entry at `idx`, with a fresh slot.
    pub(crate) fn entry_target(&self, idx: usize) -> ChainTarget {
        ChainTarget::entry(self.entries[idx].id, Slot::new(idx, self.generation))
    }

    // === Totals ===

    /// Minutes logged by the chunks in `range`.
    #[must_use]
    pub fn total_minutes(&self, range: Range<usize>) -> i64 {
        self.chunks
            .get(clamp(range, self.chunks.len()))
            .unwrap_or_default()
            .iter()
            .map(Chunk::duration_minutes)
            .sum()
    }

    /// Bytes of text in the entries in `range`.
    #[must_use]
    pub fn entries_total_text(&self, range: Range<usize>) -> usize {
        self.entries
            .get(clamp(range, self.entries.len()))
            .unwrap_or_default()
            .iter()
            .map(|e| e.text.len())
            .sum()
    }

    // === Breakpoints ===

    /// Legacy section boundaries.
    #[must_use]
    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// Legacy section boundaries, for editing.
    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    /// Chunk index of every breakpoint; `num_chunks()` where the chunk is
    /// unknown.
    #[must_use]
    pub fn breakpoint_chunk_indices(&self) -> Vec<usize> {
        self.breakpoints
            .iter()
            .map(|key| {
                self.chunk_index(key).unwrap_or_else(|| {
                    tracing::warn!(breakpoint = %key, "breakpoint is not a known chunk");
                    self.chunks.len()
                })
            })
            .collect()
    }

    /// Number of chunks in each section.
    ///
    /// The last section runs to the newest chunk.
    #[must_use]
    pub fn chunks_per_breakpoint(&self) -> Vec<usize> {
        let mut indices = self.breakpoint_chunk_indices();
        if indices.is_empty() {
            return indices;
        }
        indices.push(self.chunks.len().saturating_sub(1));
        indices
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]))
            .collect()
    }
}

fn clamp(range: Range<usize>, len: usize) -> Range<usize> {
    let end = range.end.min(len);
    range.start.min(end)..end
}

fn check_chunk_key(id: TimeKey) -> CoreResult<()> {
    if id.is_null() {
        return Err(CoreError::NullKey {
            kind: RecordKind::Chunk,
        });
    }
    if !id.is_chunk() {
        return Err(KeyError::range("minor_id").into());
    }
    Ok(())
}

fn check_entry_key(id: TimeKey) -> CoreResult<()> {
    if id.is_null() {
        return Err(CoreError::NullKey {
            kind: RecordKind::Entry,
        });
    }
    if !id.is_entry() {
        return Err(KeyError::range("minor_id").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    fn node(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn log() -> LogStore {
        LogStore::new(SegmentContext::heap("test"))
    }

    #[test]
    fn append_chunk_closes_previous() {
        let mut log = log();
        log.append_chunk(key("202401010900"), node("202301010000"))
            .unwrap();
        log.append_chunk(key("202401011000"), node("202301010001"))
            .unwrap();

        assert_eq!(log.chunks()[0].close(), Some(key("202401011000")));
        assert!(log.chunks()[1].is_open());
        assert_eq!(log.open_chunk().unwrap().id(), key("202401011000"));
    }

    #[test]
    fn explicit_close_is_kept() {
        let mut log = log();
        log.append_chunk(key("202401010900"), node("202301010000"))
            .unwrap();
        log.close_open_chunk(key("202401010955")).unwrap();
        assert!(log.open_chunk().is_none());
        assert!(log.close_open_chunk(key("202401011000")).is_err());

        log.append_chunk(key("202401011000"), node("202301010000"))
            .unwrap();
        assert_eq!(log.chunks()[0].close(), Some(key("202401010955")));
    }

    #[test]
    fn append_chunk_rejects_bad_ids() {
        let mut log = log();
        let owner = node("202301010000");
        log.append_chunk(key("202401010900"), owner).unwrap();

        let err = log.append_chunk(key("202401010900"), owner).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Duplicate);
        let err = log.append_chunk(key("202401010800"), owner).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        let err = log.append_chunk(TimeKey::NULL, owner).unwrap_err();
        assert_eq!(err.kind(), FailureKind::NullKey);
        let err = log
            .append_chunk(key("202401011000.1"), owner)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidKey);
    }

    #[test]
    fn entries_require_their_chunk() {
        let mut log = log();
        let err = log
            .append_entry(Entry::new(key("202401010900.1"), None, "x"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnknownReference);

        log.append_chunk(key("202401010900"), node("202301010000"))
            .unwrap();
        log.append_entry(Entry::new(key("202401010900.1"), None, "x"))
            .unwrap();
        let err = log
            .append_entry(Entry::new(key("202401010900.1"), None, "y"))
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Duplicate);

        let entry = log.entry(key("202401010900.1")).unwrap();
        assert!(entry.is_linked());
        assert_eq!(log.chunk_of(entry).unwrap().id(), key("202401010900"));
        assert_eq!(log.entries_of_chunk(key("202401010900")).count(), 1);
    }

    #[test]
    fn out_of_order_insert_invalidates_slots() {
        let mut log = log();
        let owner = node("202301010000");
        log.insert_chunk(Chunk::new(key("202401011000"), owner))
            .unwrap();
        log.append_entry(Entry::new(key("202401011000.1"), None, "x"))
            .unwrap();
        let g = log.generation();

        log.insert_chunk(Chunk::with_close(
            key("202401010900"),
            owner,
            Some(key("202401010930")),
        ))
        .unwrap();
        assert!(log.generation() > g);

        // stale slot points at index 0, which is now the earlier chunk
        let entry = log.entry(key("202401011000.1")).unwrap();
        assert_eq!(log.chunk_of(entry).unwrap().id(), key("202401011000"));
    }

    #[test]
    fn staging_reports_each_entry() {
        let mut log = log();
        log.append_chunk(key("202401010900"), node("202301010000"))
            .unwrap();
        let staging: EntryStaging = [
            Entry::new(key("202401010900.1"), None, "a"),
            Entry::new(key("202401011000.1"), None, "b"),
        ]
        .into_iter()
        .collect();

        let results = log.attach(staging);
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert_eq!(
            results[1].1.as_ref().unwrap_err().kind(),
            FailureKind::UnknownReference
        );
        assert_eq!(log.num_entries(), 1);
    }

    #[test]
    fn two_pass_linking_drops_orphans() {
        let mut log = log();
        let owner = node("202301010000");
        log.insert_unlinked_entry(Entry::new(key("202401010900.1"), None, "a"))
            .unwrap();
        log.insert_unlinked_entry(Entry::new(key("202401010900.2"), None, "b"))
            .unwrap();
        log.insert_unlinked_entry(Entry::new(key("202401020900.1"), None, "c"))
            .unwrap();
        log.insert_chunk(Chunk::new(key("202401010900"), owner))
            .unwrap();

        let report = log.add_entries_to_chunks();
        assert_eq!(report.attached, 2);
        assert_eq!(report.orphans.len(), 1);
        assert_eq!(report.orphans[0].id(), key("202401020900.1"));
        assert_eq!(log.num_entries(), 2);
        assert!(log.entries().iter().all(Entry::is_linked));
        assert_eq!(log.chunks()[0].entries().len(), 2);
    }

    #[test]
    fn merge_then_prune_removes_collisions() {
        let mut log = log();
        let owner = node("202301010000");
        log.insert_chunk(Chunk::new(key("202401010900"), owner))
            .unwrap();
        let merged = log
            .merge_chunks([
                Chunk::new(key("202401010900"), node("202301010001")),
                Chunk::new(key("202401011000"), owner),
            ])
            .unwrap();
        assert_eq!(merged, 2);
        assert_eq!(log.num_chunks(), 3);

        assert_eq!(log.prune_duplicate_chunks(), 1);
        assert_eq!(log.num_chunks(), 2);
        assert_eq!(log.chunks()[0].node(), owner);
    }

    #[test]
    fn totals_over_ranges() {
        let mut log = log();
        let owner = node("202301010000");
        log.append_chunk(key("202401010900"), owner).unwrap();
        log.append_entry(Entry::new(key("202401010900.1"), None, "abc"))
            .unwrap();
        log.append_chunk(key("202401011000"), owner).unwrap();
        log.append_entry(Entry::new(key("202401011000.1"), None, "de"))
            .unwrap();
        log.close_open_chunk(key("202401011030")).unwrap();

        assert_eq!(log.total_minutes(0..2), 90);
        assert_eq!(log.total_minutes(1..10), 30);
        assert_eq!(log.entries_total_text(0..2), 5);
        assert_eq!(log.entries_total_text(5..9), 0);
    }

    #[test]
    fn breakpoint_sections() {
        let mut log = log();
        let owner = node("202301010000");
        for k in ["202401010900", "202401011000", "202401011100", "202401011200"] {
            log.append_chunk(key(k), owner).unwrap();
        }
        log.breakpoints_mut().add_later(key("202401010900")).unwrap();
        log.breakpoints_mut().add_later(key("202401011100")).unwrap();

        assert_eq!(log.breakpoint_chunk_indices(), vec![0, 2]);
        assert_eq!(log.chunks_per_breakpoint(), vec![2, 1]);

        log.breakpoints_mut().add_later(key("202402010000")).unwrap();
        assert_eq!(log.breakpoint_chunk_indices(), vec![0, 2, 4]);
    }

    #[test]
    fn chunk_keys_from_entries_are_unique() {
        let mut log = log();
        for k in ["202401010900.1", "202401010900.2", "202401011000.1"] {
            log.insert_unlinked_entry(Entry::new(key(k), None, "")).unwrap();
        }
        assert_eq!(
            log.chunk_keys_from_entries(),
            vec![key("202401010900"), key("202401011000")]
        );
    }

    #[test]
    fn budget_is_enforced() {
        let mut log = LogStore::new(SegmentContext::bounded("tiny", 1));
        let err = log
            .append_chunk(key("202401010900"), node("202301010000"))
            .unwrap_err();
        assert!(matches!(err, CoreError::SegmentExhausted { .. }));
        assert_eq!(log.num_chunks(), 0);
    }
}
