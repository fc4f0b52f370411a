//! Structural snapshots of a Log.
//!
//! A snapshot lists chunks, entries and threaded chains by their canonical
//! strings, so two Logs compare equal exactly when they hold the same
//! content, whatever their arena layout. Snapshots print as JSON for
//! readable assertion failures.

use fz_core::LogStore;
use serde::Serialize;
use std::collections::BTreeMap;

/// One chunk in a [`LogSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkSnapshot {
    /// Chunk id.
    pub id: String,
    /// Owning Node.
    pub node: String,
    /// Close time, if closed.
    pub close: Option<String>,
    /// Linked entries in chunk order.
    pub entries: Vec<String>,
}

/// One entry in a [`LogSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySnapshot {
    /// Entry id.
    pub id: String,
    /// Explicit owner.
    pub node: Option<String>,
    /// Text body.
    pub text: String,
}

/// Content of a Log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSnapshot {
    /// Chunks in key order.
    pub chunks: Vec<ChunkSnapshot>,
    /// Entries in key order.
    pub entries: Vec<EntrySnapshot>,
    /// Breakpoints in order.
    pub breakpoints: Vec<String>,
    /// Threaded chains by Node, oldest element first.
    pub chains: BTreeMap<String, Vec<String>>,
}

impl LogSnapshot {
    /// Captures `log`.
    pub fn capture(log: &LogStore) -> Self {
        let chunks = log
            .chunks()
            .iter()
            .map(|c| ChunkSnapshot {
                id: c.id().to_string(),
                node: c.node().to_string(),
                close: c.close().map(|t| t.to_string()),
                entries: c.entries().iter().map(ToString::to_string).collect(),
            })
            .collect();
        let entries = log
            .entries()
            .iter()
            .map(|e| EntrySnapshot {
                id: e.id().to_string(),
                node: e.node().map(|n| n.to_string()),
                text: e.text().to_string(),
            })
            .collect();
        let breakpoints = log.breakpoints().iter().map(|t| t.to_string()).collect();
        let chains = log
            .chains()
            .iter()
            .map(|(node, _)| {
                let elements = log.chain_of(node).map(|e| e.id().to_string()).collect();
                (node.to_string(), elements)
            })
            .collect();
        Self {
            chunks,
            entries,
            breakpoints,
            chains,
        }
    }

    /// Pretty JSON of the snapshot.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("Failed to serialize snapshot")
    }
}

/// Asserts that two Logs hold the same content.
pub fn assert_same_log(actual: &LogStore, expected: &LogStore) {
    let actual = LogSnapshot::capture(actual);
    let expected = LogSnapshot::capture(expected);
    if actual != expected {
        panic!(
            "Logs differ\nExpected:\n{}\nActual:\n{}",
            expected.to_json(),
            actual.to_json()
        );
    }
}
