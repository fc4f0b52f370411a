//! Structural comparison of two Entity Stores.

use crate::graph::edge::Edge;
use crate::graph::node::Node;
use crate::graph::store::EntityStore;
use std::fmt::Write;

/// Compares two stores record by record.
///
/// Incident-edge caches are compared as sets, and direct references
/// (arena positions) are ignored since two equal graphs may have been built
/// in a different order.
///
/// # Errors
///
/// Returns a trace naming every difference found.
pub fn identical_graphs(a: &EntityStore, b: &EntityStore) -> Result<(), String> {
    let mut trace = String::new();

    if a.num_nodes() != b.num_nodes() {
        let _ = writeln!(trace, "node count {} != {}", a.num_nodes(), b.num_nodes());
    }
    for node in a.nodes() {
        match b.node(node.id()) {
            None => {
                let _ = writeln!(trace, "node {} missing", node.id());
            }
            Some(other) => {
                if let Some(field) = node_difference(node, other) {
                    let _ = writeln!(trace, "node {} differs in {field}", node.id());
                }
            }
        }
    }
    for node in b.nodes() {
        if a.node(node.id()).is_none() {
            let _ = writeln!(trace, "node {} unexpected", node.id());
        }
    }

    if a.num_edges() != b.num_edges() {
        let _ = writeln!(trace, "edge count {} != {}", a.num_edges(), b.num_edges());
    }
    for edge in a.edges() {
        match b.edge(edge.id()) {
            None => {
                let _ = writeln!(trace, "edge {} missing", edge.id());
            }
            Some(other) if !same_ratings(edge, other) => {
                let _ = writeln!(trace, "edge {} differs in ratings", edge.id());
            }
            Some(_) => {}
        }
    }

    if a.topics() != b.topics() {
        let _ = writeln!(
            trace,
            "topics differ ({} vs {})",
            a.topics().len(),
            b.topics().len()
        );
    }

    let names_a: Vec<&str> = a.list_names().collect();
    let names_b: Vec<&str> = b.list_names().collect();
    if names_a != names_b {
        let _ = writeln!(trace, "named lists {names_a:?} != {names_b:?}");
    }
    for list in a.lists() {
        if let Some(other) = b.list(list.name()) {
            if list != other {
                let _ = writeln!(trace, "named list {} differs", list.name());
            }
        }
    }

    if trace.is_empty() {
        Ok(())
    } else {
        Err(trace)
    }
}

fn node_difference(a: &Node, b: &Node) -> Option<&'static str> {
    if a.topics != b.topics {
        return Some("topics");
    }
    if a.valuation != b.valuation {
        return Some("valuation");
    }
    if a.completion != b.completion {
        return Some("completion");
    }
    if a.required != b.required {
        return Some("required");
    }
    if a.text != b.text {
        return Some("text");
    }
    if a.targetdate != b.targetdate {
        return Some("targetdate");
    }
    if a.tdproperty != b.tdproperty {
        return Some("tdproperty");
    }
    if a.repeats != b.repeats {
        return Some("repeats");
    }
    if a.tdpattern != b.tdpattern {
        return Some("tdpattern");
    }
    if a.tdevery != b.tdevery {
        return Some("tdevery");
    }
    if a.tdspan != b.tdspan {
        return Some("tdspan");
    }
    if a.sup_edges != b.sup_edges {
        return Some("superior edges");
    }
    if a.dep_edges != b.dep_edges {
        return Some("dependency edges");
    }
    None
}

fn same_ratings(a: &Edge, b: &Edge) -> bool {
    a.dependency == b.dependency
        && a.significance == b.significance
        && a.importance == b.importance
        && a.urgency == b.urgency
        && a.priority == b.priority
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::named_list::ListFeatures;
    use crate::graph::NodeId;
    use crate::segment::SegmentContext;

    fn id(s: &str) -> NodeId {
        s.parse().unwrap()
    }

    fn build(order: &[&str]) -> EntityStore {
        let mut g = EntityStore::new(SegmentContext::heap("cmp"));
        for s in order {
            g.create_node(id(s)).unwrap().set_text(format!("node {s}"));
        }
        g.create_edge(id("202401010900"), id("202401010901"))
            .unwrap()
            .urgency = 0.5;
        g.add_to_list("l", id("202401010900"), ListFeatures::NONE, 0)
            .unwrap();
        g
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = build(&["202401010900", "202401010901"]);
        let b = build(&["202401010901", "202401010900"]);
        identical_graphs(&a, &b).unwrap();
    }

    #[test]
    fn differences_are_traced() {
        let a = build(&["202401010900", "202401010901"]);
        let mut b = build(&["202401010900", "202401010901"]);
        b.node_mut(id("202401010900")).unwrap().set_valuation(2.0);
        b.edge_mut(crate::graph::EdgeId::new(id("202401010900"), id("202401010901")))
            .unwrap()
            .priority = 1.0;

        let trace = identical_graphs(&a, &b).unwrap_err();
        assert!(trace.contains("node 202401010900 differs in valuation"));
        assert!(trace.contains("differs in ratings"));
    }
}
