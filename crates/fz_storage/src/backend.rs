//! Storage backend trait.

use crate::error::StorageResult;

/// An append-oriented byte store.
///
/// Segment snapshots and table rows are appended as opaque, self-framed
/// byte runs. Readers walk the store from offset zero and stop at the first
/// frame that does not check out, so a torn write at the tail only costs the
/// last frame.
///
/// # Invariants
///
/// - `append` returns the offset where the bytes start
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - `replace_all` is the only operation that rewrites earlier bytes
///
/// # Implementors
///
/// - [`super::InMemoryBackend`]
/// - [`super::FileBackend`]
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range leaves the
    /// store, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Reads the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            crate::StorageError::Corrupted(format!("store of {size} bytes does not fit in memory"))
        })?;
        self.read_at(0, len)
    }

    /// Appends bytes to the end of the store and returns their offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Discards the current contents and stores `data` in their place.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be truncated or written.
    fn replace_all(&mut self, data: &[u8]) -> StorageResult<()> {
        self.truncate(0)?;
        self.append(data)?;
        self.flush()
    }

    /// Pushes pending writes towards the medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, which is where the next `append`
    /// will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the store to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size or
    /// the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
