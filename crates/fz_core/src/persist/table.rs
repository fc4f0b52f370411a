//! Table files: a magic followed by one checksummed frame per CBOR row.

use crate::error::{CoreError, CoreResult};
use crate::frame::{decode_all, Frame, FrameKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Magic bytes at the start of every table file.
pub const TABLE_MAGIC: [u8; 4] = *b"FZTB";

/// The tables of a backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Graph Nodes.
    Nodes,
    /// Graph Edges.
    Edges,
    /// Topics.
    Topics,
    /// Named Lists.
    Lists,
    /// Log chunks.
    Chunks,
    /// Log entries.
    Entries,
    /// Log breakpoints.
    Breakpoints,
    /// Cached Node histories.
    Histories,
}

impl Table {
    /// Every table.
    pub const ALL: [Table; 8] = [
        Self::Nodes,
        Self::Edges,
        Self::Topics,
        Self::Lists,
        Self::Chunks,
        Self::Entries,
        Self::Breakpoints,
        Self::Histories,
    ];

    /// File name inside the store directory, also the manifest key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Edges => "edges",
            Self::Topics => "topics",
            Self::Lists => "lists",
            Self::Chunks => "chunks",
            Self::Entries => "entries",
            Self::Breakpoints => "breakpoints",
            Self::Histories => "histories",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rows read from a table, with the damage met on the way.
#[derive(Debug)]
pub(crate) struct TableRows<T> {
    pub(crate) rows: Vec<T>,
    pub(crate) damaged: Vec<CoreError>,
}

impl<T> Default for TableRows<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            damaged: Vec::new(),
        }
    }
}

/// Encodes rows into table file bytes and returns them with the row count.
pub(crate) fn encode_rows<T, I>(rows: I) -> CoreResult<(Vec<u8>, u64)>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut buf = TABLE_MAGIC.to_vec();
    let mut count = 0u64;
    let mut payload = Vec::new();
    for row in rows {
        payload.clear();
        ciborium::into_writer(&row, &mut payload)?;
        buf.extend(Frame::new(FrameKind::Row, payload.clone()).encode()?);
        count += 1;
    }
    Ok((buf, count))
}

/// Decodes table file bytes.
///
/// Rows that fail their checksum or do not decode are reported as
/// [`CoreError::Integrity`] in `damaged`; decoding stops at a torn frame.
///
/// # Errors
///
/// [`CoreError::InvalidFormat`] when the table magic is missing.
pub(crate) fn decode_rows<T: DeserializeOwned>(table: Table, data: &[u8]) -> CoreResult<TableRows<T>> {
    if data.len() < TABLE_MAGIC.len() || data[..TABLE_MAGIC.len()] != TABLE_MAGIC {
        return Err(CoreError::invalid_format(format!(
            "table {table} has no table magic"
        )));
    }
    let (frames, stop) = decode_all(&data[TABLE_MAGIC.len()..]);

    let mut out = TableRows::default();
    for (i, frame) in frames.into_iter().enumerate() {
        if frame.kind != FrameKind::Row {
            out.damaged.push(CoreError::integrity(format!(
                "{table} frame {i} is not a row"
            )));
            continue;
        }
        match ciborium::from_reader::<T, _>(frame.payload.as_slice()) {
            Ok(row) => out.rows.push(row),
            Err(err) => out
                .damaged
                .push(CoreError::integrity(format!("{table} row {i}: {err}"))),
        }
    }
    if let Some((offset, err)) = stop {
        out.damaged.push(CoreError::integrity(format!(
            "{table} unreadable from offset {}: {err}",
            offset + TABLE_MAGIC.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        text: String,
    }

    fn rows() -> Vec<Row> {
        (1..=3)
            .map(|id| Row {
                id,
                text: format!("row {id}"),
            })
            .collect()
    }

    #[test]
    fn encode_then_decode() {
        let (bytes, count) = encode_rows(rows()).unwrap();
        assert_eq!(count, 3);
        let decoded: TableRows<Row> = decode_rows(Table::Nodes, &bytes).unwrap();
        assert!(decoded.damaged.is_empty());
        assert_eq!(decoded.rows, rows());
    }

    #[test]
    fn missing_magic_is_a_format_error() {
        let result = decode_rows::<Row>(Table::Edges, b"nope");
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn torn_tail_is_reported_as_damage() {
        let (mut bytes, _) = encode_rows(rows()).unwrap();
        bytes.truncate(bytes.len() - 3);
        let decoded: TableRows<Row> = decode_rows(Table::Chunks, &bytes).unwrap();
        assert_eq!(decoded.rows.len(), 2);
        assert_eq!(decoded.damaged.len(), 1);
        assert!(decoded.damaged[0].is_recoverable());
    }

    #[test]
    fn undecodable_row_is_skipped() {
        let mut bytes = TABLE_MAGIC.to_vec();
        bytes.extend(Frame::new(FrameKind::Row, vec![0xff]).encode().unwrap());
        let (good, _) = encode_rows(rows()).unwrap();
        bytes.extend_from_slice(&good[TABLE_MAGIC.len()..]);

        let decoded: TableRows<Row> = decode_rows(Table::Entries, &bytes).unwrap();
        assert_eq!(decoded.rows.len(), 3);
        assert!(matches!(decoded.damaged[0], CoreError::Integrity { .. }));
    }
}
