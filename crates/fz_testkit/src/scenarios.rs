//! Ready-made Logs and graphs.

use fz_core::{Entry, EntityStore, ListFeatures, LogStore, NodeId, SegmentContext, TimeKey};
use std::sync::Arc;

/// Parses a key, panicking on malformed test input.
pub fn key(s: &str) -> TimeKey {
    s.parse().expect("invalid test key")
}

/// Parses a Node id, panicking on malformed test input.
pub fn node(s: &str) -> NodeId {
    s.parse().expect("invalid test node id")
}

/// Node `A` of the two-node scenario.
pub fn node_a() -> NodeId {
    node("202301010000")
}

/// Node `B` of the two-node scenario.
pub fn node_b() -> NodeId {
    node("202301010001")
}

/// A Log with chunk `202401010900` owned by `A` and closed at `0955`,
/// holding entry `.1` without an owner, followed by the open chunk
/// `202401011000` owned by `B`. Chains are not threaded.
pub fn two_node_log(context: Arc<SegmentContext>) -> LogStore {
    let mut log = LogStore::new(context);
    log.append_chunk(key("202401010900"), node_a())
        .expect("append chunk C1");
    log.append_entry(Entry::new(key("202401010900.1"), None, "first note"))
        .expect("append entry");
    log.close_open_chunk(key("202401010955"))
        .expect("close chunk C1");
    log.append_chunk(key("202401011000"), node_b())
        .expect("append chunk C2");
    log
}

/// A Log with entries at `202401010900.1` and `202401020100.1`.
pub fn two_day_log(context: Arc<SegmentContext>) -> LogStore {
    let mut log = LogStore::new(context);
    for (chunk, entry) in [
        ("202401010900", "202401010900.1"),
        ("202401020100", "202401020100.1"),
    ] {
        log.append_chunk(key(chunk), node_a())
            .expect("append chunk");
        log.append_entry(Entry::new(key(entry), None, "note"))
            .expect("append entry");
    }
    log
}

/// A Log of `days` days with one chunk per hour from 09:00 to 16:00,
/// alternating between `nodes` owners, and `entries_per_chunk` entries in
/// each chunk. Every third entry names the next owner explicitly.
pub fn working_days_log(
    context: Arc<SegmentContext>,
    days: u8,
    nodes: usize,
    entries_per_chunk: u8,
) -> LogStore {
    let owners: Vec<NodeId> = (0..nodes.max(1))
        .map(|i| NodeId::new(owner_key(i)))
        .collect();
    let mut log = LogStore::new(context);
    let mut turn = 0usize;
    for day in 1..=days.clamp(1, 28) {
        for hour in 9..17u8 {
            let chunk = TimeKey::chunk(2024, 2, day, hour, 0).expect("valid chunk key");
            log.append_chunk(chunk, owners[turn % owners.len()])
                .expect("append chunk");
            for minor in 1..=entries_per_chunk {
                let owner = (minor % 3 == 0).then(|| owners[(turn + 1) % owners.len()]);
                log.append_entry(Entry::new(chunk.with_minor(minor), owner, "work"))
                    .expect("append entry");
            }
            turn += 1;
        }
    }
    log
}

/// Node id for the `i`th generated owner, one minute apart from 2023-01-01.
pub fn owner_key(i: usize) -> TimeKey {
    let minutes = i % (28 * 24 * 60);
    let day = u8::try_from(minutes / (24 * 60) + 1).unwrap_or(1);
    let hour = u8::try_from(minutes / 60 % 24).unwrap_or(0);
    let minute = u8::try_from(minutes % 60).unwrap_or(0);
    TimeKey::chunk(2023, 1, day, hour, minute).expect("valid owner key")
}

/// A small graph: a root with two dependencies, a topic on each Node and
/// a FIFO list of the dependencies.
pub fn small_graph(context: Arc<SegmentContext>) -> EntityStore {
    let mut graph = EntityStore::new(context);
    let root = node("202301010000");
    let first = node("202301020000");
    let second = node("202301030000");
    let topic = graph
        .find_or_add_topic("work", "Work")
        .expect("add topic");
    for (id, text) in [(root, "root"), (first, "first"), (second, "second")] {
        let created = graph.create_node(id).expect("create node");
        created.set_text(text);
        created.add_topic(topic, 1.0);
    }
    graph.create_edge(first, root).expect("create edge");
    graph.create_edge(second, root).expect("create edge");
    graph
        .add_to_list("recent", first, ListFeatures::FIFO, 2)
        .expect("add to list");
    graph
        .add_to_list("recent", second, ListFeatures::FIFO, 2)
        .expect("add to list");
    graph
}
