//! Named segments and the active-segment context.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::frame::{decode_all, Frame, FrameKind};
use crate::graph::EntityStore;
use crate::log::LogStore;
use crate::persist::{GraphImage, LogImage};
use crate::segment::context::SegmentContext;
use fs2::FileExt;
use fz_storage::{FileBackend, InMemoryBackend, StorageBackend, StorageError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Magic bytes at the start of every segment medium.
pub const SEGMENT_MAGIC: [u8; 4] = *b"FZSG";

const HEADER_SIZE: usize = 12;

/// Handle to an Entity Store living in a segment.
pub type SharedEntityStore = Arc<RwLock<EntityStore>>;

/// Handle to a Log living in a segment.
pub type SharedLogStore = Arc<RwLock<LogStore>>;

/// How this process relates to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    /// Created the segment, may allocate stores and publish them.
    Server,
    /// Opened a segment published by a server; read-only.
    Client,
}

struct Segment {
    context: Arc<SegmentContext>,
    role: SegmentRole,
    medium: Box<dyn StorageBackend>,
    size: u64,
    path: Option<PathBuf>,
    lock_path: Option<PathBuf>,
    _lock: Option<File>,
    entity_store: Option<SharedEntityStore>,
    log_store: Option<SharedLogStore>,
    delete_on_drop: bool,
}

impl Drop for Segment {
    fn drop(&mut self) {
        if !self.delete_on_drop {
            return;
        }
        for path in [&self.path, &self.lock_path].into_iter().flatten() {
            if let Err(err) = fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), "unable to delete segment file: {err}");
                }
            }
        }
        tracing::info!(segment = self.context.name(), "segment destroyed");
    }
}

/// Owns named segments and designates one of them as active.
///
/// Containers are built from the active segment's [`SegmentContext`]
/// rather than from hidden global state. Asking for the context of a
/// segment that is not active is an error, never a silent fallback.
///
/// When [`Config::segment_dir`] is set, segments are backed by
/// `<dir>/<name>.seg` and a server holds an exclusive advisory lock on
/// `<dir>/<name>.lock`, so there is at most one writer per segment. A
/// client process opens the same name with
/// [`SegmentManager::open_segment`] and finds the stores the server
/// published.
///
/// # Example
///
/// ```rust
/// use fz_core::{Config, SegmentManager};
///
/// let mut manager = SegmentManager::new(Config::default());
/// manager.create_segment("graph", 1 << 20)?;
/// let graph = manager.allocate_entity_store_in_active_segment()?;
/// graph.write().create_node("202401010900".parse()?)?;
/// assert!(manager.locate_entity_store_in_active_segment()?.is_some());
/// # Ok::<(), fz_core::CoreError>(())
/// ```
pub struct SegmentManager {
    config: Config,
    segments: BTreeMap<String, Segment>,
    active: Option<String>,
    cached: Vec<Option<String>>,
}

impl fmt::Debug for SegmentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentManager")
            .field("segments", &self.segments.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("cached", &self.cached.len())
            .finish()
    }
}

impl SegmentManager {
    /// Creates a manager without segments.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            segments: BTreeMap::new(),
            active: None,
            cached: Vec::new(),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Creation ===

    /// Creates a segment of `size` bytes in the server role and makes it
    /// active.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentExists`] if the name is taken,
    /// [`CoreError::SegmentLocked`] if another server holds it,
    /// [`CoreError::SegmentAllocation`] if the memory cannot be reserved,
    /// or I/O errors for a file-backed segment.
    pub fn create_segment(&mut self, name: &str, size: u64) -> CoreResult<Arc<SegmentContext>> {
        if self.segments.contains_key(name) {
            return Err(CoreError::SegmentExists {
                name: name.to_string(),
            });
        }

        let (medium, path, lock_path, lock): (Box<dyn StorageBackend>, _, _, _) =
            match &self.config.segment_dir {
                Some(dir) => {
                    fs::create_dir_all(dir)?;
                    let lock_path = dir.join(format!("{name}.lock"));
                    let lock = OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .truncate(false)
                        .open(&lock_path)?;
                    if lock.try_lock_exclusive().is_err() {
                        return Err(CoreError::SegmentLocked {
                            name: name.to_string(),
                        });
                    }
                    let path = dir.join(format!("{name}.seg"));
                    let mut medium = FileBackend::open(&path)?;
                    medium.replace_all(&header(size))?;
                    (Box::new(medium), Some(path), Some(lock_path), Some(lock))
                }
                None => {
                    let mut medium = InMemoryBackend::with_reserved(size).map_err(|_| {
                        CoreError::SegmentAllocation {
                            name: name.to_string(),
                            size,
                        }
                    })?;
                    medium.append(&header(size))?;
                    (Box::new(medium), None, None, None)
                }
            };

        let context = SegmentContext::bounded(name, size);
        tracing::info!(segment = name, size, file_backed = path.is_some(), "segment created");
        self.segments.insert(
            name.to_string(),
            Segment {
                context: Arc::clone(&context),
                role: SegmentRole::Server,
                medium,
                size,
                path,
                lock_path,
                _lock: lock,
                entity_store: None,
                log_store: None,
                delete_on_drop: true,
            },
        );
        self.active = Some(name.to_string());
        Ok(context)
    }

    /// Creates a segment of [`Config::default_segment_size`] bytes.
    ///
    /// # Errors
    ///
    /// As [`SegmentManager::create_segment`].
    pub fn create_default_segment(&mut self, name: &str) -> CoreResult<Arc<SegmentContext>> {
        self.create_segment(name, self.config.default_segment_size)
    }

    /// Opens a segment published by a server process, in the client role,
    /// and makes it active.
    ///
    /// The newest published Entity Store and Log are restored into the
    /// segment; a torn tail after them is ignored.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] without a segment directory or
    /// segment file, [`CoreError::SegmentExists`] if this manager already
    /// has the name, [`CoreError::InvalidFormat`] for a bad header, and
    /// failures restoring the stores.
    pub fn open_segment(&mut self, name: &str) -> CoreResult<Arc<SegmentContext>> {
        if self.segments.contains_key(name) {
            return Err(CoreError::SegmentExists {
                name: name.to_string(),
            });
        }
        let not_found = || CoreError::SegmentNotFound {
            name: name.to_string(),
        };
        let dir = self.config.segment_dir.as_ref().ok_or_else(not_found)?;
        let path = dir.join(format!("{name}.seg"));
        let medium = match FileBackend::open_existing(&path) {
            Ok(medium) => medium,
            Err(StorageError::NotFound(_)) => return Err(not_found()),
            Err(err) => return Err(err.into()),
        };

        let length = medium.size()?;
        if length < HEADER_SIZE as u64 {
            return Err(CoreError::invalid_format("invalid segment header"));
        }
        let size = parse_header(&medium.read_at(0, HEADER_SIZE)?)?;
        let context = SegmentContext::bounded(name, size);

        let body_len = usize::try_from(length - HEADER_SIZE as u64)
            .map_err(|_| CoreError::invalid_format("segment does not fit in memory"))?;
        let body = medium.read_at(HEADER_SIZE as u64, body_len)?;
        let (frames, stop) = decode_all(&body);
        if let Some((offset, err)) = stop {
            tracing::warn!(segment = name, offset, "ignoring unreadable segment tail: {err}");
        }
        let graph = frames.iter().rev().find(|f| f.kind == FrameKind::EntityStore);
        let log = frames.iter().rev().find(|f| f.kind == FrameKind::LogStore);

        let entity_store = match graph {
            Some(frame) => {
                let image: GraphImage = ciborium::from_reader(frame.payload.as_slice())?;
                let (store, report) = image.restore(Arc::clone(&context), &self.config)?;
                tracing::debug!(segment = name, accepted = report.accepted, "entity store located");
                Some(Arc::new(RwLock::new(store)))
            }
            None => None,
        };
        let log_store = match log {
            Some(frame) => {
                let image: LogImage = ciborium::from_reader(frame.payload.as_slice())?;
                let (store, report) = image.restore(Arc::clone(&context), &self.config)?;
                tracing::debug!(segment = name, accepted = report.accepted, "log located");
                Some(Arc::new(RwLock::new(store)))
            }
            None => None,
        };

        tracing::info!(segment = name, size, "segment opened");
        self.segments.insert(
            name.to_string(),
            Segment {
                context: Arc::clone(&context),
                role: SegmentRole::Client,
                medium: Box::new(medium),
                size,
                path: Some(path),
                lock_path: None,
                _lock: None,
                entity_store,
                log_store,
                delete_on_drop: false,
            },
        );
        self.active = Some(name.to_string());
        Ok(context)
    }

    // === Active context ===

    /// Makes `name` the active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] if the name is unknown.
    pub fn set_active(&mut self, name: &str) -> CoreResult<()> {
        if !self.segments.contains_key(name) {
            return Err(CoreError::SegmentNotFound {
                name: name.to_string(),
            });
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    /// Name of the active segment.
    #[must_use]
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Context of the active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoActiveSegment`].
    pub fn active_context(&self) -> CoreResult<Arc<SegmentContext>> {
        self.active_segment().map(|s| Arc::clone(&s.context))
    }

    /// Context of `name`, which must be the active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] for an unknown name and
    /// [`CoreError::SegmentNotActive`] when another segment is active.
    pub fn context_for(&self, name: &str) -> CoreResult<Arc<SegmentContext>> {
        let segment = self.segments.get(name).ok_or_else(|| CoreError::SegmentNotFound {
            name: name.to_string(),
        })?;
        if self.active.as_deref() != Some(name) {
            return Err(CoreError::SegmentNotActive {
                name: name.to_string(),
            });
        }
        Ok(Arc::clone(&segment.context))
    }

    /// Saves the active segment so that [`SegmentManager::restore`] can
    /// return to it. Saves nest.
    pub fn cache(&mut self) {
        self.cached.push(self.active.clone());
    }

    /// Returns to the most recently cached active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] without a matching cache, and
    /// [`CoreError::SegmentNotFound`] if the cached segment is gone.
    pub fn restore(&mut self) -> CoreResult<()> {
        let cached = self
            .cached
            .pop()
            .ok_or_else(|| CoreError::invalid_operation("restore without cache"))?;
        match cached {
            Some(name) => self.set_active(&name),
            None => {
                self.active = None;
                Ok(())
            }
        }
    }

    fn active_segment(&self) -> CoreResult<&Segment> {
        self.active
            .as_ref()
            .and_then(|name| self.segments.get(name))
            .ok_or(CoreError::NoActiveSegment)
    }

    fn active_segment_mut(&mut self) -> CoreResult<&mut Segment> {
        let name = self.active.as_ref().ok_or(CoreError::NoActiveSegment)?;
        self.segments
            .get_mut(name)
            .ok_or(CoreError::NoActiveSegment)
    }

    // === Lifecycle ===

    /// Drops the bookkeeping of a segment without destroying its storage.
    ///
    /// Returns false if the name is unknown.
    pub fn forget(&mut self, name: &str) -> bool {
        let Some(mut segment) = self.segments.remove(name) else {
            return false;
        };
        segment.delete_on_drop = false;
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        tracing::info!(segment = name, "segment forgotten");
        true
    }

    /// Removes a segment and destroys its storage.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] if the name is unknown.
    pub fn remove_segment(&mut self, name: &str) -> CoreResult<()> {
        let mut segment = self.segments.remove(name).ok_or_else(|| CoreError::SegmentNotFound {
            name: name.to_string(),
        })?;
        segment.delete_on_drop = true;
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        Ok(())
    }

    /// Sets whether the storage of `name` is destroyed with the manager.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`] if the name is unknown.
    pub fn set_delete_on_drop(&mut self, name: &str, value: bool) -> CoreResult<()> {
        let segment = self.segments.get_mut(name).ok_or_else(|| CoreError::SegmentNotFound {
            name: name.to_string(),
        })?;
        segment.delete_on_drop = value;
        Ok(())
    }

    /// Names of all segments.
    pub fn segment_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments.keys().map(String::as_str)
    }

    /// True if the manager knows `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.segments.contains_key(name)
    }

    /// Role of this process for `name`.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<SegmentRole> {
        self.segments.get(name).map(|s| s.role)
    }

    // === Stores ===

    /// Constructs an empty Entity Store in the active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoActiveSegment`], and [`CoreError::InvalidOperation`]
    /// for a client segment or when the segment already has one.
    pub fn allocate_entity_store_in_active_segment(&mut self) -> CoreResult<SharedEntityStore> {
        let config = self.config.clone();
        let segment = self.writable_active_segment()?;
        if segment.entity_store.is_some() {
            return Err(CoreError::invalid_operation(format!(
                "segment {} already has an entity store",
                segment.context.name()
            )));
        }
        let store = Arc::new(RwLock::new(EntityStore::with_config(
            Arc::clone(&segment.context),
            &config,
        )));
        segment.entity_store = Some(Arc::clone(&store));
        tracing::info!(segment = segment.context.name(), "entity store allocated");
        Ok(store)
    }

    /// Finds the Entity Store of the active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoActiveSegment`].
    pub fn locate_entity_store_in_active_segment(&self) -> CoreResult<Option<SharedEntityStore>> {
        Ok(self.active_segment()?.entity_store.clone())
    }

    /// Constructs an empty Log in the active segment.
    ///
    /// # Errors
    ///
    /// As [`SegmentManager::allocate_entity_store_in_active_segment`].
    pub fn allocate_log_store_in_active_segment(&mut self) -> CoreResult<SharedLogStore> {
        let segment = self.writable_active_segment()?;
        if segment.log_store.is_some() {
            return Err(CoreError::invalid_operation(format!(
                "segment {} already has a log",
                segment.context.name()
            )));
        }
        let store = Arc::new(RwLock::new(LogStore::new(Arc::clone(&segment.context))));
        segment.log_store = Some(Arc::clone(&store));
        tracing::info!(segment = segment.context.name(), "log allocated");
        Ok(store)
    }

    /// Finds the Log of the active segment.
    ///
    /// # Errors
    ///
    /// [`CoreError::NoActiveSegment`].
    pub fn locate_log_store_in_active_segment(&self) -> CoreResult<Option<SharedLogStore>> {
        Ok(self.active_segment()?.log_store.clone())
    }

    fn writable_active_segment(&mut self) -> CoreResult<&mut Segment> {
        let segment = self.active_segment_mut()?;
        if segment.role == SegmentRole::Client {
            return Err(CoreError::invalid_operation(format!(
                "segment {} is opened read-only",
                segment.context.name()
            )));
        }
        Ok(segment)
    }

    /// Replaces the published snapshots of `name` with the current state of
    /// its stores so that clients can locate them. The medium keeps only
    /// the header and the newest snapshots, which must fit in the size the
    /// segment was created with. Returns the number of snapshot bytes.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentNotFound`], [`CoreError::InvalidOperation`] for
    /// a client segment, [`CoreError::SegmentExhausted`] when the snapshots
    /// exceed the segment size (the previous snapshots are kept), and codec
    /// or storage errors.
    pub fn publish(&mut self, name: &str) -> CoreResult<u64> {
        let sync = self.config.sync_on_store;
        let segment = self.segments.get_mut(name).ok_or_else(|| CoreError::SegmentNotFound {
            name: name.to_string(),
        })?;
        if segment.role == SegmentRole::Client {
            return Err(CoreError::invalid_operation(format!(
                "segment {name} is opened read-only"
            )));
        }

        let mut snapshot = Vec::new();
        if let Some(store) = &segment.entity_store {
            let image = GraphImage::capture(&store.read());
            snapshot.extend(snapshot_frame(FrameKind::EntityStore, &image)?);
        }
        if let Some(store) = &segment.log_store {
            let image = LogImage::capture(&store.read());
            snapshot.extend(snapshot_frame(FrameKind::LogStore, &image)?);
        }

        let written = snapshot.len() as u64;
        let capacity = segment.size.saturating_sub(HEADER_SIZE as u64);
        if written > capacity {
            return Err(CoreError::SegmentExhausted {
                name: name.to_string(),
                requested: written,
                available: capacity,
            });
        }

        segment.medium.truncate(HEADER_SIZE as u64)?;
        segment.medium.append(&snapshot)?;
        segment.medium.flush()?;
        if sync && segment.path.is_some() {
            segment.medium.sync()?;
        }
        tracing::info!(segment = name, bytes = written, "segment published");
        Ok(written)
    }
}

fn header(size: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE);
    buf.extend_from_slice(&SEGMENT_MAGIC);
    buf.extend_from_slice(&size.to_le_bytes());
    buf
}

fn parse_header(bytes: &[u8]) -> CoreResult<u64> {
    if bytes.len() < HEADER_SIZE || bytes[..4] != SEGMENT_MAGIC {
        return Err(CoreError::invalid_format("invalid segment header"));
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[4..HEADER_SIZE]);
    Ok(u64::from_le_bytes(raw))
}

fn snapshot_frame<T: serde::Serialize>(kind: FrameKind, image: &T) -> CoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(image, &mut payload)?;
    Frame::new(kind, payload).encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::log::Entry;
    use crate::timekey::TimeKey;
    use tempfile::tempdir;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn key(s: &str) -> TimeKey {
        s.parse().unwrap()
    }

    #[test]
    fn create_activates_and_refuses_duplicates() {
        let mut manager = SegmentManager::new(Config::default());
        assert!(matches!(
            manager.active_context(),
            Err(CoreError::NoActiveSegment)
        ));

        manager.create_segment("graph", 4096).unwrap();
        assert_eq!(manager.active_name(), Some("graph"));
        assert_eq!(manager.active_context().unwrap().budget(), Some(4096));
        assert!(matches!(
            manager.create_segment("graph", 4096),
            Err(CoreError::SegmentExists { .. })
        ));
    }

    #[test]
    fn impossible_size_fails_allocation() {
        let mut manager = SegmentManager::new(Config::default());
        assert!(matches!(
            manager.create_segment("huge", u64::MAX),
            Err(CoreError::SegmentAllocation { .. })
        ));
        assert!(!manager.contains("huge"));
    }

    #[test]
    fn context_for_inactive_segment_fails() {
        let mut manager = SegmentManager::new(Config::default());
        manager.create_segment("a", 1024).unwrap();
        manager.create_segment("b", 1024).unwrap();

        assert!(manager.context_for("b").is_ok());
        assert!(matches!(
            manager.context_for("a"),
            Err(CoreError::SegmentNotActive { .. })
        ));
        assert!(matches!(
            manager.context_for("c"),
            Err(CoreError::SegmentNotFound { .. })
        ));
        assert!(manager.set_active("c").is_err());
    }

    #[test]
    fn cache_and_restore_nest() {
        let mut manager = SegmentManager::new(Config::default());
        manager.create_segment("a", 1024).unwrap();
        manager.cache();
        manager.create_segment("b", 1024).unwrap();
        manager.cache();
        manager.set_active("a").unwrap();

        manager.restore().unwrap();
        assert_eq!(manager.active_name(), Some("b"));
        manager.restore().unwrap();
        assert_eq!(manager.active_name(), Some("a"));
        assert!(manager.restore().is_err());
    }

    #[test]
    fn stores_are_allocated_once_and_located() {
        let mut manager = SegmentManager::new(Config::default());
        manager.create_segment("s", 1 << 20).unwrap();
        assert!(manager.locate_entity_store_in_active_segment().unwrap().is_none());

        let graph = manager.allocate_entity_store_in_active_segment().unwrap();
        graph.write().create_node(id("202401010900")).unwrap();
        let found = manager.locate_entity_store_in_active_segment().unwrap().unwrap();
        assert_eq!(found.read().num_nodes(), 1);
        assert!(manager.allocate_entity_store_in_active_segment().is_err());

        let log = manager.allocate_log_store_in_active_segment().unwrap();
        assert!(Arc::ptr_eq(
            &log,
            &manager.locate_log_store_in_active_segment().unwrap().unwrap()
        ));
    }

    #[test]
    fn stores_charge_their_segment() {
        let mut manager = SegmentManager::new(Config::default());
        let context = manager.create_segment("tiny", 64).unwrap();
        let log = manager.allocate_log_store_in_active_segment().unwrap();
        let mut log = log.write();
        let mut result = Ok(());
        for minute in 0..60u8 {
            let chunk = key(&format!("2024010109{minute:02}"));
            result = log.append_chunk(chunk, id("202301010000")).map(|_| ());
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(CoreError::SegmentExhausted { .. })));
        assert!(context.used() <= 64);
    }

    #[test]
    fn forget_keeps_storage_and_remove_deletes_it() {
        let temp = tempdir().unwrap();
        let config = Config::default().segment_dir(temp.path());
        let mut manager = SegmentManager::new(config);

        manager.create_segment("kept", 1024).unwrap();
        manager.create_segment("gone", 1024).unwrap();
        assert!(manager.forget("kept"));
        assert!(manager.active_name().is_some());
        manager.remove_segment("gone").unwrap();
        assert!(manager.active_name().is_none());

        assert!(temp.path().join("kept.seg").exists());
        assert!(!temp.path().join("gone.seg").exists());
        assert!(!manager.forget("kept"));
    }

    #[test]
    fn second_server_is_locked_out() {
        let temp = tempdir().unwrap();
        let config = Config::default().segment_dir(temp.path());
        let mut first = SegmentManager::new(config.clone());
        let mut second = SegmentManager::new(config);

        first.create_segment("graph", 1024).unwrap();
        assert!(matches!(
            second.create_segment("graph", 1024),
            Err(CoreError::SegmentLocked { .. })
        ));
    }

    #[test]
    fn client_locates_published_stores() {
        let temp = tempdir().unwrap();
        let config = Config::default().segment_dir(temp.path());
        let mut server = SegmentManager::new(config.clone());
        server.create_segment("shared", 1 << 20).unwrap();
        {
            let graph = server.allocate_entity_store_in_active_segment().unwrap();
            graph.write().create_node(id("202401010900")).unwrap();
            let log = server.allocate_log_store_in_active_segment().unwrap();
            let mut log = log.write();
            log.append_chunk(key("202401010900"), id("202401010900"))
                .unwrap();
            log.append_entry(Entry::new(key("202401010900.1"), None, "note"))
                .unwrap();
        }
        server.publish("shared").unwrap();

        let mut client = SegmentManager::new(config);
        client.open_segment("shared").unwrap();
        assert_eq!(client.role("shared"), Some(SegmentRole::Client));
        let graph = client.locate_entity_store_in_active_segment().unwrap().unwrap();
        assert!(graph.read().node(id("202401010900")).is_some());
        let log = client.locate_log_store_in_active_segment().unwrap().unwrap();
        assert_eq!(log.read().num_entries(), 1);

        assert!(client.allocate_log_store_in_active_segment().is_err());
        assert!(client.publish("shared").is_err());

        // the client never deletes the server's storage
        drop(client);
        assert!(temp.path().join("shared.seg").exists());
        drop(server);
        assert!(!temp.path().join("shared.seg").exists());
    }

    #[test]
    fn newest_snapshot_wins() {
        let temp = tempdir().unwrap();
        let config = Config::default().segment_dir(temp.path());
        let mut server = SegmentManager::new(config.clone());
        server.create_segment("s", 1 << 20).unwrap();
        let graph = server.allocate_entity_store_in_active_segment().unwrap();
        server.publish("s").unwrap();
        graph.write().create_node(id("202401010900")).unwrap();
        server.publish("s").unwrap();

        let mut client = SegmentManager::new(config);
        client.open_segment("s").unwrap();
        let located = client.locate_entity_store_in_active_segment().unwrap().unwrap();
        assert_eq!(located.read().num_nodes(), 1);
    }

    #[test]
    fn repeated_publish_keeps_one_snapshot() {
        let temp = tempdir().unwrap();
        let config = Config::default().segment_dir(temp.path());
        let mut server = SegmentManager::new(config.clone());
        server.create_segment("s", 4096).unwrap();
        let graph = server.allocate_entity_store_in_active_segment().unwrap();
        graph.write().create_node(id("202401010900")).unwrap();

        let written = server.publish("s").unwrap();
        let path = temp.path().join("s.seg");
        let first = fs::metadata(&path).unwrap().len();
        assert_eq!(first, HEADER_SIZE as u64 + written);
        for _ in 0..50 {
            server.publish("s").unwrap();
        }
        let last = fs::metadata(&path).unwrap().len();
        assert_eq!(last, first);
        assert!(last <= 4096);

        let mut client = SegmentManager::new(config);
        client.open_segment("s").unwrap();
        let located = client.locate_entity_store_in_active_segment().unwrap().unwrap();
        assert_eq!(located.read().num_nodes(), 1);
    }

    #[test]
    fn oversized_snapshot_is_refused_and_previous_kept() {
        let temp = tempdir().unwrap();
        let config = Config::default().segment_dir(temp.path());
        let mut server = SegmentManager::new(config.clone());
        server.create_segment("s", 1024).unwrap();
        let graph = server.allocate_entity_store_in_active_segment().unwrap();
        graph.write().create_node(id("202401010900")).unwrap();
        server.publish("s").unwrap();
        let published = fs::metadata(temp.path().join("s.seg")).unwrap().len();

        graph
            .write()
            .node_mut(id("202401010900"))
            .unwrap()
            .set_text("x".repeat(4096));
        assert!(matches!(
            server.publish("s"),
            Err(CoreError::SegmentExhausted { .. })
        ));
        assert_eq!(fs::metadata(temp.path().join("s.seg")).unwrap().len(), published);

        let mut client = SegmentManager::new(config);
        client.open_segment("s").unwrap();
        let located = client.locate_entity_store_in_active_segment().unwrap().unwrap();
        assert_eq!(located.read().node(id("202401010900")).unwrap().text(), "");
    }

    #[test]
    fn in_memory_publish_is_bounded_too() {
        let mut manager = SegmentManager::new(Config::default());
        manager.create_segment("m", 2048).unwrap();
        let log = manager.allocate_log_store_in_active_segment().unwrap();
        log.write()
            .append_chunk(key("202401010900"), id("202301010000"))
            .unwrap();
        let written = manager.publish("m").unwrap();
        for _ in 0..20 {
            assert_eq!(manager.publish("m").unwrap(), written);
        }
        let medium = &manager.segments["m"].medium;
        assert_eq!(medium.size().unwrap(), HEADER_SIZE as u64 + written);
    }

    #[test]
    fn open_without_directory_or_file_fails() {
        let mut manager = SegmentManager::new(Config::default());
        assert!(matches!(
            manager.open_segment("x"),
            Err(CoreError::SegmentNotFound { .. })
        ));

        let temp = tempdir().unwrap();
        let mut manager = SegmentManager::new(Config::default().segment_dir(temp.path()));
        assert!(matches!(
            manager.open_segment("x"),
            Err(CoreError::SegmentNotFound { .. })
        ));
    }
}
