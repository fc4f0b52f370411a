//! In-memory backend for process-local segments.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A byte store held in process memory.
///
/// Used for segments that never leave the creating process and for tests.
/// A segment created with a byte size reserves that much up front through
/// [`InMemoryBackend::with_reserved`], so an impossible size fails at
/// creation rather than at the first snapshot.
///
/// # Example
///
/// ```rust
/// use fz_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::with_reserved(4096).unwrap();
/// assert!(backend.reserved() >= 4096);
/// backend.append(b"snapshot").unwrap();
/// assert_eq!(backend.size().unwrap(), 8);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty backend with `bytes` of capacity reserved.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Allocation`] if the reservation fails.
    pub fn with_reserved(bytes: u64) -> StorageResult<Self> {
        let wanted =
            usize::try_from(bytes).map_err(|_| StorageError::Allocation { requested: bytes })?;
        let mut data = Vec::new();
        data.try_reserve_exact(wanted)
            .map_err(|_| StorageError::Allocation { requested: bytes })?;
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    /// Creates a backend holding pre-existing bytes.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns the number of bytes reserved.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.data.read().capacity()
    }

    /// Returns a copy of all bytes in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Clears the contents, keeping the reservation.
    pub fn clear(&mut self) {
        self.data.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn replace_all(&mut self, new_data: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        data.clear();
        data.extend_from_slice(new_data);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let current_size = data.len() as u64;

        if new_size > current_size {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot truncate to {new_size} bytes, store holds {current_size}"),
            )));
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}
