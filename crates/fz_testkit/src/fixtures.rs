//! Test fixtures for backing stores and segments.
//!
//! Every fixture owns its temporary directory, which is removed when the
//! fixture is dropped.

use fz_core::{BackingStore, Config, SegmentContext, SegmentManager};
use fz_storage::{FileBackend, StorageBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// An unbounded standalone segment context.
pub fn heap_context(name: &str) -> Arc<SegmentContext> {
    SegmentContext::heap(name)
}

/// A backing store in a temporary directory.
pub struct TestStore {
    /// The store instance.
    pub store: BackingStore,
    config: Config,
    temp_dir: TempDir,
}

impl TestStore {
    /// Opens a store with default settings.
    pub fn new() -> Self {
        Self::with_config(Config::default().sync_on_store(false))
    }

    /// Opens a store with `config`.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = BackingStore::open(&temp_dir.path().join("store"), config.clone())
            .expect("Failed to open backing store");
        Self {
            store,
            config,
            temp_dir,
        }
    }

    /// Path of the store directory.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().join("store")
    }

    /// Closes and reopens the store, releasing and retaking its lock.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            config,
            temp_dir,
        } = self;
        drop(store);
        let store = BackingStore::open(&temp_dir.path().join("store"), config.clone())
            .expect("Failed to reopen backing store");
        Self {
            store,
            config,
            temp_dir,
        }
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = BackingStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// A segment manager, optionally backed by a temporary directory.
pub struct TestSegments {
    /// The manager instance.
    pub manager: SegmentManager,
    temp_dir: Option<TempDir>,
}

impl TestSegments {
    /// Manager with in-memory segments.
    pub fn memory() -> Self {
        Self {
            manager: SegmentManager::new(Config::default()),
            temp_dir: None,
        }
    }

    /// Manager with file-backed segments.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::default()
            .segment_dir(temp_dir.path())
            .sync_on_store(false);
        Self {
            manager: SegmentManager::new(config),
            temp_dir: Some(temp_dir),
        }
    }

    /// Segment directory if file-backed.
    pub fn dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// A second manager over the same directory, for playing the client.
    pub fn client(&self) -> SegmentManager {
        SegmentManager::new(self.manager.config().clone())
    }
}

impl std::ops::Deref for TestSegments {
    type Target = SegmentManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

impl std::ops::DerefMut for TestSegments {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.manager
    }
}

/// Runs a test with a temporary backing store.
///
/// # Example
///
/// ```rust
/// use fz_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     assert!(store.manifest().tables.is_empty());
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut BackingStore) -> R,
{
    let mut test_store = TestStore::new();
    f(&mut test_store.store)
}

/// Flips every bit of the byte at `offset` in `path`.
pub fn flip_byte(path: &Path, offset: usize) {
    let mut backend = FileBackend::open_existing(path).expect("Failed to open file");
    let mut data = backend.read_all().expect("Failed to read file");
    assert!(offset < data.len(), "offset {offset} past end of {path:?}");
    data[offset] ^= 0xff;
    backend.replace_all(&data).expect("Failed to rewrite file");
}
