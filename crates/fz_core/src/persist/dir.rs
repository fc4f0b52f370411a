//! Backing-store directory management.
//!
//! ```text
//! <store_path>/
//! ├─ MANIFEST          # Format version and table row counts
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ nodes, edges, topics, lists
//! ├─ chunks, entries, breakpoints
//! └─ histories         # Node history cache
//! ```
//!
//! Every file is replaced with write-then-rename, so a reader never sees a
//! half-written table.

use crate::error::{CoreError, CoreResult};
use crate::persist::manifest::Manifest;
use crate::persist::table::Table;
use fs2::FileExt;
use fz_storage::{FileBackend, StorageBackend, StorageError};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "MANIFEST";
const MANIFEST_TEMP: &str = "MANIFEST.tmp";
const LOCK_FILE: &str = "LOCK";

/// A backing-store directory held under an exclusive lock.
///
/// Only one `StoreDir` can exist per directory at a time, across processes.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock ([`CoreError::StoreLocked`])
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the MANIFEST file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Returns the path to a table file.
    #[must_use]
    pub fn table_path(&self, table: Table) -> PathBuf {
        self.path.join(table.name())
    }

    /// Loads the manifest, `None` for a new store.
    ///
    /// # Errors
    ///
    /// I/O errors and a manifest that does not decode.
    pub fn load_manifest(&self) -> CoreResult<Option<Manifest>> {
        let manifest_path = self.manifest_path();
        if !manifest_path.exists() {
            return Ok(None);
        }

        let mut data = Vec::new();
        File::open(&manifest_path)?.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(None);
        }
        Manifest::decode(&data).map(Some)
    }

    /// Saves the manifest atomically.
    ///
    /// # Errors
    ///
    /// I/O errors.
    pub fn save_manifest(&self, manifest: &Manifest) -> CoreResult<()> {
        let temp_path = self.path.join(MANIFEST_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&manifest.encode())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.manifest_path())?;
        self.sync_directory()
    }

    /// Replaces a table file with `bytes`.
    ///
    /// # Errors
    ///
    /// Storage and I/O errors.
    pub fn write_table(&self, table: Table, bytes: &[u8], sync: bool) -> CoreResult<()> {
        let temp_path = self.path.join(format!("{}.tmp", table.name()));
        let mut backend = FileBackend::open(&temp_path)?;
        backend.replace_all(bytes)?;
        if sync {
            backend.sync()?;
        }
        drop(backend);

        fs::rename(&temp_path, self.table_path(table))?;
        if sync {
            self.sync_directory()?;
        }
        Ok(())
    }

    /// Reads a table file, `None` if it was never written.
    ///
    /// # Errors
    ///
    /// Storage and I/O errors.
    pub fn read_table(&self, table: Table) -> CoreResult<Option<Vec<u8>>> {
        match FileBackend::open_existing(&self.table_path(table)) {
            Ok(backend) => Ok(Some(backend.read_all()?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// True if the store has neither a manifest nor any table.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        !self.manifest_path().exists()
            && Table::ALL.iter().all(|t| !self.table_path(*t).exists())
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> CoreResult<()> {
        Ok(())
    }
}
