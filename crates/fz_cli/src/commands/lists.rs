//! Lists command implementation.

use super::{open_store, scratch};
use crate::error::CliResult;
use fz_core::{BackingStore, ListFeatures};
use std::path::Path;

/// One Named List.
#[derive(Debug, PartialEq, Eq)]
pub struct ListSummary {
    /// List name.
    pub name: String,
    /// Feature names.
    pub features: Vec<&'static str>,
    /// Maximum size, 0 when unbounded.
    pub maxsize: usize,
    /// Members with their text.
    pub members: Vec<(String, String)>,
}

/// Runs the lists command.
pub fn run(path: &Path) -> CliResult<()> {
    let store = open_store(path)?;
    let lists = lists(&store)?;
    if lists.is_empty() {
        println!("No named lists");
    }
    for list in &lists {
        let bound = if list.maxsize == 0 {
            "unbounded".to_string()
        } else {
            format!("max {}", list.maxsize)
        };
        println!(
            "{} ({} members, {bound}) [{}]",
            list.name,
            list.members.len(),
            list.features.join(", ")
        );
        for (id, text) in &list.members {
            println!("  {id}  {text}");
        }
    }
    Ok(())
}

/// Loads the graph and summarizes its Named Lists.
pub fn lists(store: &BackingStore) -> CliResult<Vec<ListSummary>> {
    let (graph, _) = store.load_graph(scratch())?;
    Ok(graph
        .lists()
        .map(|list| ListSummary {
            name: list.name().to_string(),
            features: [
                (ListFeatures::PREPEND, "prepend"),
                (ListFeatures::UNIQUE, "unique"),
                (ListFeatures::FIFO, "fifo"),
            ]
            .into_iter()
            .filter(|(bit, _)| list.features().contains(*bit))
            .map(|(_, name)| name)
            .collect(),
            maxsize: list.maxsize(),
            members: list
                .iter()
                .map(|id| {
                    let text = graph.node(id).map(|n| n.text().to_string()).unwrap_or_default();
                    (id.to_string(), text)
                })
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fz_testkit::scenarios::small_graph;
    use fz_testkit::{heap_context, TestStore};

    #[test]
    fn lists_show_members_and_features() {
        let mut test_store = TestStore::new();
        test_store
            .store_graph(&small_graph(heap_context("g")))
            .unwrap();

        let lists = lists(&test_store).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].name, "recent");
        assert_eq!(lists[0].features, vec!["fifo"]);
        assert_eq!(lists[0].maxsize, 2);
        assert_eq!(
            lists[0].members,
            vec![
                ("202301020000".to_string(), "first".to_string()),
                ("202301030000".to_string(), "second".to_string()),
            ]
        );
    }
}
