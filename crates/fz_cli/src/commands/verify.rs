//! Verify command implementation.

use super::{open_store, scratch};
use crate::error::{CliError, CliResult};
use fz_core::{BackingStore, ChainReport, Config, IntegrityReport, NodeHistories};
use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Graph records offered and accepted.
    pub graph: (u64, u64),
    /// Log records offered and accepted.
    pub log: (u64, u64),
    /// Rows or records skipped while loading.
    pub skipped: u64,
    /// Structural findings in the loaded Log.
    pub integrity: IntegrityReport,
    /// Result of threading chains over the loaded Log.
    pub chains: ChainReport,
    /// Nodes whose cached history differs from a fresh build.
    pub stale_histories: usize,
}

impl VerifyResult {
    /// Total number of problems found.
    pub fn findings(&self) -> u64 {
        self.skipped
            + self.integrity.len() as u64
            + self.chains.failures.total()
            + self.stale_histories as u64
    }

    fn is_ok(&self) -> bool {
        self.findings() == 0
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> CliResult<()> {
    println!("Verifying store at {}", path.display());
    println!();

    let store = open_store(path)?;
    let result = verify(&store)?;
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err(CliError::VerifyFailed(result.findings()))
    }
}

/// Loads everything in `store` and checks it.
pub fn verify(store: &BackingStore) -> CliResult<VerifyResult> {
    // count every problem instead of stopping at the first
    let config = Config::default().max_bulk_failures(0);

    let (_, graph_report) = store.load_graph(scratch())?;
    let (mut log, log_report) = store.load_log(scratch())?;
    let integrity = log.verify_integrity();
    let fresh = NodeHistories::build(&log);
    let chains = log.thread_chains(&config)?;

    let (cached, _) = store.load_node_histories()?;
    let stale_histories = cached
        .iter()
        .filter(|(node, history)| fresh.history_of(*node) != Some(*history))
        .count();

    Ok(VerifyResult {
        graph: (graph_report.processed, graph_report.accepted),
        log: (log_report.processed, log_report.accepted),
        skipped: graph_report.failures.total() + log_report.failures.total(),
        integrity,
        chains,
        stale_histories,
    })
}

fn print_result(result: &VerifyResult) {
    println!("Graph: {} of {} records loaded", result.graph.1, result.graph.0);
    println!("Log:   {} of {} records loaded", result.log.1, result.log.0);
    println!(
        "Chains: {} chunks and {} entries over {} nodes",
        result.chains.chunks, result.chains.entries, result.chains.nodes
    );

    let integrity = &result.integrity;
    let sections = [
        ("Minor id gaps", &integrity.minor_gaps),
        ("Entries without chunk", &integrity.missing_chunks),
        ("Unlinked entries", &integrity.unlinked_entries),
        ("Stray open chunks", &integrity.stray_open_chunks),
        ("Self links", &integrity.self_links),
    ];
    for (title, keys) in sections {
        if keys.is_empty() {
            continue;
        }
        println!("  {title}: {}", keys.len());
        for key in keys.iter().take(10) {
            println!("    - {key}");
        }
        if keys.len() > 10 {
            println!("    ... and {} more", keys.len() - 10);
        }
    }
    for (kind, count) in result.chains.failures.nonzero() {
        println!("  Chain {}: {count}", kind.label());
    }
    if result.stale_histories > 0 {
        println!("  Stale cached histories: {}", result.stale_histories);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fz_testkit::scenarios::{node_a, two_node_log};
    use fz_testkit::{flip_byte, heap_context, TestStore};
    use fz_core::{NodeHistory, Table};

    #[test]
    fn clean_store_passes() {
        let mut test_store = TestStore::new();
        test_store
            .store_log(&two_node_log(heap_context("l")))
            .unwrap();
        test_store.refresh_node_history_cache(heap_context("h")).unwrap();

        let result = verify(&test_store).unwrap();
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(result.chains.nodes, 2);
    }

    #[test]
    fn damaged_table_is_reported() {
        let mut test_store = TestStore::new();
        test_store
            .store_log(&two_node_log(heap_context("l")))
            .unwrap();
        let path = test_store.path().join(Table::Entries.name());
        let len = std::fs::metadata(&path).unwrap().len() as usize;
        flip_byte(&path, len - 1);

        let result = verify(&test_store).unwrap();
        assert_eq!(result.skipped, 1);
        assert!(!result.is_ok());
    }

    #[test]
    fn stale_history_cache_is_reported() {
        let mut test_store = TestStore::new();
        test_store
            .store_log(&two_node_log(heap_context("l")))
            .unwrap();
        let mut histories = NodeHistories::new();
        histories.insert(node_a(), NodeHistory::default());
        test_store.store_node_histories(&histories).unwrap();

        assert_eq!(verify(&test_store).unwrap().stale_histories, 1);
    }
}
