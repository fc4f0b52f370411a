//! Cross-module scenarios over the Log, the graph and segments.

use fz_core::{
    ChainTarget, Config, CoreError, Direction, Entry, FailureKind, LogStore, NodeHistories,
};
use fz_testkit::prelude::*;
use fz_testkit::scenarios::{key, node, node_a, node_b, two_day_log, two_node_log};

#[test]
fn inherited_entry_is_not_chained() {
    let mut log = LogStore::new(heap_context("scenario"));
    log.append_chunk(key("202401010900"), node_a()).unwrap();
    log.append_entry(Entry::new(key("202401010900.1"), None, "no owner"))
        .unwrap();
    log.close_open_chunk(key("202401010955")).unwrap();
    log.append_chunk(key("202401011000"), node_b()).unwrap();

    let report = log.thread_chains(&Config::default()).unwrap();
    assert_eq!(report.chunks, 2);
    assert_eq!(report.entries, 0);

    let chain_a: Vec<_> = log.chain_of(node_a()).map(|e| e.id()).collect();
    let chain_b: Vec<_> = log.chain_of(node_b()).map(|e| e.id()).collect();
    assert_eq!(chain_a, vec![key("202401010900")]);
    assert_eq!(chain_b, vec![key("202401011000")]);
    assert_eq!(log.chains().get(node_a()).unwrap().len(), 1);
}

#[test]
fn inherited_entry_counts_for_history() {
    let log = two_node_log(heap_context("scenario"));
    let histories = NodeHistories::build(&log);

    let history = histories.history_of(node_a()).unwrap();
    assert!(history.chunks.contains(&key("202401010900")));
    assert!(history.entries.contains(&key("202401010900.1")));
    assert!(histories.history_of(node_b()).unwrap().entries.is_empty());
}

#[test]
fn time_interval_excludes_the_upper_bound_day() {
    let log = two_day_log(heap_context("scenario"));
    let range = log.entries_t_interval(key("202401010000"), key("202401020000"));
    let ids: Vec<_> = log.entries()[range].iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec![key("202401010900.1")]);
}

#[test]
fn empty_interval_is_end_of_arena() {
    let log = two_day_log(heap_context("scenario"));
    let range = log.entries_t_interval(key("202402010000"), key("202403010000"));
    assert_eq!(range, log.num_entries()..log.num_entries());
    let range = log.chunks_n_interval(key("202401010900"), 0, Direction::NewestFirst);
    assert!(range.is_empty());
}

#[test]
fn explicit_owner_joins_the_other_chain() {
    let mut log = two_node_log(heap_context("scenario"));
    log.append_entry(Entry::new(key("202401011000.1"), Some(node_a()), "for A"))
        .unwrap();
    log.thread_chains(&Config::default()).unwrap();

    let chain_a: Vec<_> = log.chain_of(node_a()).map(|e| e.id()).collect();
    assert_eq!(chain_a, vec![key("202401010900"), key("202401011000.1")]);
    let reverse: Vec<_> = log.chain_of_reverse(node_a()).map(|e| e.id()).collect();
    assert_eq!(reverse, vec![key("202401011000.1"), key("202401010900")]);
    assert!(matches!(
        log.newest_element_of(node_a()),
        Some(ChainTarget::Entry { .. })
    ));
}

#[test]
fn threading_twice_needs_a_clear() {
    let mut log = two_node_log(heap_context("scenario"));
    log.thread_chains(&Config::default()).unwrap();
    assert!(matches!(
        log.thread_chains(&Config::default()),
        Err(CoreError::InvalidOperation { .. })
    ));
    log.clear_chains();
    assert_eq!(log.thread_chains(&Config::default()).unwrap().nodes, 2);
}

#[test]
fn staged_entries_report_each_attach() {
    let mut log = two_node_log(heap_context("scenario"));
    let staging = [
        Entry::new(key("202401011000.1"), None, "fits"),
        Entry::new(key("202401011200.1"), None, "no chunk"),
    ]
    .into_iter()
    .collect();

    let results = log.attach(staging);
    assert!(results[0].1.is_ok());
    let err = results[1].1.as_ref().unwrap_err();
    assert_eq!(err.kind(), FailureKind::UnknownReference);
    assert!(log.entry(key("202401011200.1")).is_none());
}

#[test]
fn graph_and_log_share_one_segment() {
    let mut segments = TestSegments::memory();
    segments.create_segment("fz", 1 << 20).unwrap();
    let graph = segments.allocate_entity_store_in_active_segment().unwrap();
    let log = segments.allocate_log_store_in_active_segment().unwrap();

    graph.write().create_node(node_a()).unwrap();
    log.write().append_chunk(key("202401010900"), node_a()).unwrap();

    let context = segments.active_context().unwrap();
    assert!(std::sync::Arc::ptr_eq(graph.read().context(), &context));
    assert!(std::sync::Arc::ptr_eq(log.read().context(), &context));
    assert!(context.used() > 0);
}

#[test]
fn client_sees_what_the_server_published() {
    let mut server = TestSegments::file();
    server.create_segment("shared", 1 << 20).unwrap();
    let log = server.allocate_log_store_in_active_segment().unwrap();
    *log.write() = two_node_log(server.active_context().unwrap());
    server.publish("shared").unwrap();

    let mut client = server.client();
    client.open_segment("shared").unwrap();
    let located = client.locate_log_store_in_active_segment().unwrap().unwrap();
    assert_same_log(&located.read(), &log.read());
}

#[test]
fn unknown_edge_endpoints_are_referential_errors() {
    let mut graph = scenarios::small_graph(heap_context("graph"));
    let err = graph
        .create_edge(node("202301090000"), node("202301010000"))
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::UnknownReference);
    assert_eq!(graph.num_edges(), 2);
}
