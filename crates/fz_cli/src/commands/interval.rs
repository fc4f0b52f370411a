//! Interval command implementation.

use super::{open_store, scratch};
use crate::error::CliResult;
use crate::Format;
use fz_core::{BackingStore, LogFilter, LogStore, TimeKey};
use serde::Serialize;
use std::path::Path;

/// Entries of a time window.
#[derive(Debug, Serialize)]
pub struct IntervalResult {
    /// First minute.
    pub from: String,
    /// End minute, exclusive.
    pub before: String,
    /// Chunks starting in the window.
    pub chunks: usize,
    /// Minutes logged by those chunks.
    pub minutes: i64,
    /// Entries in the window.
    pub entries: Vec<IntervalEntry>,
}

/// One entry of an [`IntervalResult`].
#[derive(Debug, Serialize)]
pub struct IntervalEntry {
    /// Entry id.
    pub id: String,
    /// Owning Node, explicit or through the chunk.
    pub node: Option<String>,
    /// Text body.
    pub text: String,
}

/// Runs the interval command.
pub fn run(path: &Path, from: &str, before: &str, format: Format) -> CliResult<()> {
    let from = TimeKey::parse_chunk(from)?;
    let before = TimeKey::parse_chunk(before)?;
    let store = open_store(path)?;
    let result = interval(&store, from, before)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => {
            for entry in &result.entries {
                let node = entry.node.as_deref().unwrap_or("?");
                println!("{}  [{node}]  {}", entry.id, entry.text);
            }
            println!();
            println!(
                "{} entries in {} chunks, {}h {:02}m logged",
                result.entries.len(),
                result.chunks,
                result.minutes / 60,
                result.minutes % 60
            );
        }
    }
    Ok(())
}

/// Selects the entries from `from` up to, not including, `before`.
pub fn interval(store: &BackingStore, from: TimeKey, before: TimeKey) -> CliResult<IntervalResult> {
    let mut log = LogStore::new(scratch());
    let filter = LogFilter::new().from(from);
    // a window starting in the future has nothing to load
    if filter.validate(TimeKey::now()?).is_ok() {
        store.load_partial_log(&mut log, &filter)?;
    }

    let chunks = log.chunks_t_interval(from, before);
    let entries = log.entries_t_interval(from, before);
    Ok(IntervalResult {
        from: from.to_string(),
        before: before.to_string(),
        minutes: log.total_minutes(chunks.clone()),
        chunks: chunks.len(),
        entries: log.entries()[entries]
            .iter()
            .map(|e| IntervalEntry {
                id: e.id().to_string(),
                node: e
                    .node()
                    .or_else(|| log.chunk_of(e).map(|c| c.node()))
                    .map(|n| n.to_string()),
                text: e.text().to_string(),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fz_testkit::scenarios::{key, two_day_log};
    use fz_testkit::{heap_context, TestStore};

    #[test]
    fn window_excludes_its_end() {
        let mut test_store = TestStore::new();
        test_store
            .store_log(&two_day_log(heap_context("l")))
            .unwrap();

        let result = interval(&test_store, key("202401010000"), key("202401020000")).unwrap();
        assert_eq!(result.chunks, 1);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].id, "202401010900.1");
        assert_eq!(result.entries[0].node.as_deref(), Some("202301010000"));
    }

    #[test]
    fn future_window_is_empty() {
        let mut test_store = TestStore::new();
        test_store
            .store_log(&two_day_log(heap_context("l")))
            .unwrap();
        let result = interval(&test_store, key("209901010000"), key("209902010000")).unwrap();
        assert!(result.entries.is_empty());
    }
}
