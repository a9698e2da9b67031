use std::collections::{HashSet, VecDeque};

use indexmap::IndexSet;

use crate::domain::workflow::graph::{Graph, NodeKey};

/// Removes the redundant parent edges of a cleanup node.
///
/// A direct parent that is also an ancestor of another direct parent is
/// already ordered before the cleanup node by that longer path, so its direct
/// edge is dropped. Reachability is unchanged and running the reduction again
/// removes nothing.
///
/// # Returns
/// Returns the number of edges removed.
pub fn reduce_parents(graph: &mut Graph, cleanup: NodeKey) -> usize {
    let direct: IndexSet<NodeKey> = graph.parents(cleanup).collect();
    let mut redundant: IndexSet<NodeKey> = IndexSet::new();
    let mut expanded: HashSet<NodeKey> = HashSet::new();

    for start in &direct {
        let mut queue: VecDeque<NodeKey> = VecDeque::from([*start]);

        while let Some(current) = queue.pop_front() {
            if !expanded.insert(current) {
                continue;
            }

            for ancestor in graph.parents(current) {
                if direct.contains(&ancestor) {
                    // walked again from its own start
                    redundant.insert(ancestor);
                } else if !expanded.contains(&ancestor) {
                    queue.push_back(ancestor);
                }
            }
        }
    }

    for parent in &redundant {
        log::trace!("Removing redundant edge {} -> {}", graph.describe(*parent), graph.describe(cleanup));
        graph.remove_edge(*parent, cleanup);
    }

    redundant.len()
}

/// Runs [`reduce_parents`] for every cleanup node.
///
/// # Returns
/// Returns the total number of edges removed.
pub fn reduce_all(graph: &mut Graph, cleanup_nodes: &[NodeKey]) -> usize {
    cleanup_nodes.iter().map(|cleanup| reduce_parents(graph, *cleanup)).sum()
}
