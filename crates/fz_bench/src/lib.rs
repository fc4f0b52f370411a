//! Benchmark utilities.

use fz_core::{Edge, GraphRecord, Node, NodeId, SegmentContext, TimeKey};
use std::sync::Arc;

pub use fz_testkit::scenarios::working_days_log;

/// An unbounded context for benchmark stores.
pub fn context() -> Arc<SegmentContext> {
    SegmentContext::heap("bench")
}

/// Node id `i` minutes after 2020-01-01 00:00, within 2020.
pub fn node_id(i: usize) -> NodeId {
    let minutes = i % (12 * 28 * 24 * 60);
    let month = u8::try_from(minutes / (28 * 24 * 60) + 1).unwrap_or(1);
    let day = u8::try_from(minutes / (24 * 60) % 28 + 1).unwrap_or(1);
    let hour = u8::try_from(minutes / 60 % 24).unwrap_or(0);
    let minute = u8::try_from(minutes % 60).unwrap_or(0);
    NodeId::new(TimeKey::chunk(2020, month, day, hour, minute).unwrap_or(TimeKey::NULL))
}

/// Records for a tree of `count` Nodes where Node `i` depends on `i / fanout`.
pub fn tree_records(count: usize, fanout: usize) -> Vec<GraphRecord> {
    let fanout = fanout.max(1);
    let mut records: Vec<GraphRecord> = (0..count)
        .map(|i| {
            let mut node = Node::new(node_id(i));
            node.set_text(format!("node {i}"));
            GraphRecord::Node(node)
        })
        .collect();
    records.extend(
        (1..count).map(|i| GraphRecord::Edge(Edge::new(node_id(i), node_id(i / fanout)))),
    );
    records
}
