//! Inspect command implementation.

use super::{open_store, scratch};
use crate::error::CliResult;
use crate::Format;
use fz_core::{BackingStore, Table};
use fz_storage::{FileBackend, StorageBackend, StorageError};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Format version from the manifest.
    pub format_version: (u16, u16),
    /// Per-table statistics.
    pub tables: Vec<TableStats>,
    /// Number of Nodes.
    pub nodes: usize,
    /// Number of Edges.
    pub edges: usize,
    /// Number of Topics.
    pub topics: usize,
    /// Number of Named Lists.
    pub lists: usize,
    /// Number of chunks.
    pub chunks: usize,
    /// Number of entries.
    pub entries: usize,
    /// Number of breakpoints.
    pub breakpoints: usize,
    /// Oldest chunk.
    pub first_chunk: Option<String>,
    /// Newest chunk.
    pub last_chunk: Option<String>,
    /// Minutes logged over all chunks.
    pub total_minutes: i64,
    /// Rows skipped while loading, by failure kind.
    pub skipped: Vec<(String, u64)>,
}

/// Statistics for a single table file.
#[derive(Debug, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Rows recorded in the manifest.
    pub rows: Option<u64>,
    /// File size in bytes.
    pub bytes: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: Format) -> CliResult<()> {
    let store = open_store(path)?;
    let result = inspect(&store)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

/// Gathers statistics for `store`.
pub fn inspect(store: &BackingStore) -> CliResult<InspectResult> {
    let mut tables = Vec::with_capacity(Table::ALL.len());
    for table in Table::ALL {
        let bytes = match FileBackend::open_existing(&store.path().join(table.name())) {
            Ok(backend) => backend.size()?,
            Err(StorageError::NotFound(_)) => 0,
            Err(err) => return Err(err.into()),
        };
        tables.push(TableStats {
            name: table.name().to_string(),
            rows: store.manifest().rows(table.name()),
            bytes,
        });
    }

    let (graph, graph_report) = store.load_graph(scratch())?;
    let (log, log_report) = store.load_log(scratch())?;

    let mut skipped: Vec<(String, u64)> = Vec::new();
    for (kind, count) in graph_report
        .failures
        .nonzero()
        .chain(log_report.failures.nonzero())
    {
        match skipped.iter_mut().find(|(label, _)| label == kind.label()) {
            Some((_, total)) => *total += count,
            None => skipped.push((kind.label().to_string(), count)),
        }
    }

    Ok(InspectResult {
        path: store.path().display().to_string(),
        format_version: store.manifest().format_version,
        tables,
        nodes: graph.num_nodes(),
        edges: graph.num_edges(),
        topics: graph.topics().len(),
        lists: graph.lists().count(),
        chunks: log.num_chunks(),
        entries: log.num_entries(),
        breakpoints: log.breakpoints().len(),
        first_chunk: log.chunks().first().map(|c| c.id().to_string()),
        last_chunk: log.chunks().last().map(|c| c.id().to_string()),
        total_minutes: log.total_minutes(0..log.num_chunks()),
        skipped,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("fz Store: {}", result.path);
    println!(
        "Format version: {}.{}",
        result.format_version.0, result.format_version.1
    );
    println!();

    println!("Tables:");
    for table in &result.tables {
        let rows = table
            .rows
            .map_or_else(|| "-".to_string(), |r| r.to_string());
        println!("  {:<12} {:>8} rows {:>10} bytes", table.name, rows, table.bytes);
    }
    println!();

    println!("Graph:");
    println!("  Nodes:  {}", result.nodes);
    println!("  Edges:  {}", result.edges);
    println!("  Topics: {}", result.topics);
    println!("  Lists:  {}", result.lists);
    println!();

    println!("Log:");
    println!("  Chunks:      {}", result.chunks);
    println!("  Entries:     {}", result.entries);
    println!("  Breakpoints: {}", result.breakpoints);
    if let (Some(first), Some(last)) = (&result.first_chunk, &result.last_chunk) {
        println!("  Span:        {first} .. {last}");
    }
    println!(
        "  Logged:      {}h {:02}m",
        result.total_minutes / 60,
        result.total_minutes % 60
    );

    if !result.skipped.is_empty() {
        println!();
        println!("Skipped rows:");
        for (label, count) in &result.skipped {
            println!("  {label}: {count}");
        }
    }
}
