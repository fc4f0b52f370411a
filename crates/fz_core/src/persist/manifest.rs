//! Store manifest.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"FZMF";

/// Current manifest version.
pub const MANIFEST_VERSION: u16 = 1;

/// Backing-store manifest.
///
/// The manifest stores:
/// - Format version
/// - Row count of every table written so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Table name to row count.
    pub tables: BTreeMap<String, u64>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new((1, 0))
    }
}

impl Manifest {
    /// Creates a new empty manifest.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            tables: BTreeMap::new(),
        }
    }

    /// Row count of a table, `None` if it was never written.
    #[must_use]
    pub fn rows(&self, table: &str) -> Option<u64> {
        self.tables.get(table).copied()
    }

    /// Records the row count of a table.
    pub fn set_rows(&mut self, table: &str, rows: u64) {
        self.tables.insert(table.to_string(), rows);
    }

    /// Encodes the manifest to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.format_version.0.to_le_bytes());
        buf.extend_from_slice(&self.format_version.1.to_le_bytes());

        let count = u32::try_from(self.tables.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        for (name, rows) in &self.tables {
            let name_bytes = name.as_bytes();
            let name_len = u16::try_from(name_bytes.len()).unwrap_or(u16::MAX);
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(&name_bytes[..usize::from(name_len)]);
            buf.extend_from_slice(&rows.to_le_bytes());
        }
        buf
    }

    /// Decodes a manifest from bytes.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidFormat`] for a bad magic, a newer version or
    /// truncated data.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut reader = Reader { data, cursor: 0 };

        if reader.take(4)? != MANIFEST_MAGIC {
            return Err(CoreError::invalid_format("invalid manifest magic"));
        }
        let version = reader.u16()?;
        if version > MANIFEST_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version: {version}"
            )));
        }
        let format_version = (reader.u16()?, reader.u16()?);

        let count = reader.u32()?;
        let mut tables = BTreeMap::new();
        for _ in 0..count {
            let name_len = usize::from(reader.u16()?);
            let name = std::str::from_utf8(reader.take(name_len)?)
                .map_err(|_| CoreError::invalid_format("invalid table name"))?
                .to_string();
            let rows = reader.u64()?;
            tables.insert(name, rows);
        }

        Ok(Self {
            format_version,
            tables,
        })
    }
}

struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| CoreError::invalid_format("manifest too short"))?;
        let bytes = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn u16(&mut self) -> CoreResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }
}
