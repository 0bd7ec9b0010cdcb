use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::debug;

use slicknxt_core::error::CycleError;

use crate::graph::Graph;

/// Evaluation order of `graph` using Kahn's algorithm.
///
/// Among nodes that are ready at the same time the one inserted first goes
/// first. Nodes still waiting on a dependency when no further progress is
/// possible are reported as a cycle.
pub fn topological_order(graph: &Graph) -> Result<Vec<String>, CycleError> {
    let ids: Vec<&str> = graph.nodes().map(|n| n.id.as_str()).collect();

    // Calculate in-degree for each node (by insertion index)
    let mut in_degree = vec![0usize; ids.len()];
    for edge in graph.edges() {
        if let Some(idx) = graph.index_of(&edge.target) {
            in_degree[idx] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut sorted = Vec::with_capacity(ids.len());
    while let Some(Reverse(idx)) = ready.pop() {
        let id = ids[idx];
        sorted.push(id.to_string());

        // Reduce in-degree of downstream nodes
        for edge in graph.outgoing(id) {
            if let Some(next) = graph.index_of(&edge.target) {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
    }

    if sorted.len() != ids.len() {
        let nodes = ids
            .iter()
            .enumerate()
            .filter(|(idx, _)| in_degree[*idx] > 0)
            .map(|(_, id)| id.to_string())
            .collect();
        return Err(CycleError { nodes });
    }

    Ok(sorted)
}

/// Caches the evaluation order until the graph changes.
#[derive(Debug, Default)]
pub struct Scheduler {
    cached: Option<(u64, Result<Arc<[String]>, CycleError>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current order, recomputed only if the graph version moved.
    pub fn order(&mut self, graph: &Graph) -> Result<Arc<[String]>, CycleError> {
        let version = graph.version();
        if let Some((cached_version, result)) = &self.cached {
            if *cached_version == version {
                return result.clone();
            }
        }
        let result = topological_order(graph).map(Arc::<[String]>::from);
        debug!(version, ok = result.is_ok(), "Evaluation order recomputed");
        self.cached = Some((version, result.clone()));
        result
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicknxt_core::types::{EdgeDescription, NodeDescription};

    fn graph(nodes: &[(&str, &str)], edges: &[(&str, &str, &str, &str)]) -> Graph {
        let mut g = Graph::new();
        for (id, ty) in nodes {
            g.add_node(NodeDescription::new(*id, *ty)).unwrap();
        }
        for (s, sp, t, tp) in edges {
            g.add_edge(EdgeDescription::connect(*s, *sp, *t, *tp)).unwrap();
        }
        g
    }

    fn assert_valid_order(g: &Graph, order: &[String]) {
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        for e in g.edges() {
            assert!(pos(&e.source) < pos(&e.target), "{} before {}", e.source, e.target);
        }
        assert_eq!(order.len(), g.node_count());
    }

    #[test]
    fn test_order_respects_edges() {
        // inserted downstream-first on purpose
        let g = graph(
            &[
                ("disp", "boolDisplayNode"),
                ("and", "andNode"),
                ("cmp", "comparatorNode"),
                ("dial", "dialNode"),
                ("sw", "switchNode"),
            ],
            &[
                ("and", "output", "disp", "value"),
                ("cmp", "output", "and", "b"),
                ("dial", "value", "cmp", "a"),
                ("sw", "value", "and", "a"),
            ],
        );
        let order = topological_order(&g).unwrap();
        assert_valid_order(&g, &order);
        assert_eq!(order, vec!["dial", "cmp", "sw", "and", "disp"]);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let g = graph(
            &[("c", "switchNode"), ("a", "switchNode"), ("b", "switchNode")],
            &[],
        );
        assert_eq!(topological_order(&g).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_two_node_cycle_reported() {
        let g = graph(
            &[("s", "switchNode"), ("a", "notNode"), ("b", "notNode")],
            &[("a", "output", "b", "input"), ("b", "output", "a", "input")],
        );
        let err = topological_order(&g).unwrap_err();
        assert_eq!(err.nodes, vec!["a", "b"]);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let g = graph(&[("n", "notNode")], &[("n", "output", "n", "input")]);
        assert_eq!(topological_order(&g).unwrap_err().nodes, vec!["n"]);
    }

    #[test]
    fn test_cache_invalidated_on_mutation() {
        let mut g = graph(&[("s", "switchNode"), ("n", "notNode")], &[]);
        let mut sched = Scheduler::new();
        let first = sched.order(&g).unwrap();
        assert!(Arc::ptr_eq(&first, &sched.order(&g).unwrap()));

        g.add_edge(EdgeDescription::connect("n", "output", "n", "input"))
            .unwrap();
        assert!(sched.order(&g).is_err());
    }
}
