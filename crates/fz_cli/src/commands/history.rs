//! History command implementation.

use super::{open_store, scratch};
use crate::error::CliResult;
use fz_core::{BackingStore, LogFilter, LogStore, NodeHistories, NodeId};
use std::path::Path;

/// One chunk of a Node's history.
#[derive(Debug, PartialEq, Eq)]
pub struct HistoryChunk {
    /// Chunk id.
    pub id: String,
    /// Logged minutes.
    pub minutes: i64,
    /// True if the Node owns the chunk itself.
    pub owned: bool,
    /// Entries of the chunk that belong to the Node.
    pub entries: Vec<(String, String)>,
}

/// Runs the history command.
pub fn run(path: &Path, node: &str, limit: usize) -> CliResult<()> {
    let node: NodeId = node.parse()?;
    let store = open_store(path)?;
    let chunks = history(&store, node, limit)?;

    if chunks.is_empty() {
        println!("No history for {node}");
        return Ok(());
    }
    let mut total = 0;
    for chunk in &chunks {
        let marker = if chunk.owned { "*" } else { " " };
        println!("{marker} {} ({} min)", chunk.id, chunk.minutes);
        for (id, text) in &chunk.entries {
            println!("    {id}  {text}");
        }
        if chunk.owned {
            total += chunk.minutes;
        }
    }
    println!();
    println!("{} chunks, {}h {:02}m logged", chunks.len(), total / 60, total % 60);
    Ok(())
}

/// Loads the history of `node`, newest `limit` chunks when non-zero.
pub fn history(store: &BackingStore, node: NodeId, limit: usize) -> CliResult<Vec<HistoryChunk>> {
    let mut log = LogStore::new(scratch());
    let filter = LogFilter::new()
        .node(node)
        .limit(limit)
        .back_to_front(true);
    store.load_partial_log(&mut log, &filter)?;

    let histories = NodeHistories::build(&log);
    let Some(history) = histories.history_of(node) else {
        return Ok(Vec::new());
    };

    let mut keys: Vec<_> = history.chunks.iter().copied().collect();
    keys.extend(history.entries.iter().map(|e| e.chunk_key()));
    keys.sort();
    keys.dedup();

    Ok(keys
        .into_iter()
        .filter_map(|key| log.chunk(key))
        .map(|chunk| HistoryChunk {
            id: chunk.id().to_string(),
            minutes: chunk.duration_minutes(),
            owned: chunk.node() == node,
            entries: log
                .entries_of_chunk(chunk.id())
                .filter(|e| history.entries.contains(&e.id()))
                .map(|e| (e.id().to_string(), e.text().to_string()))
                .collect(),
        })
        .collect())
}
