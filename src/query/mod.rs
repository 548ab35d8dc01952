use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::graph::{ModuleGraph, ModuleId};

/// Query trait implemented by all graph metrics.
///
/// Given an immutable reference to a `ModuleGraph`, returns a result of type `R`.
pub trait Query<R> {
    fn run(&self, graph: &ModuleGraph) -> R;
}

/// One strongly connected component, members sorted by id.
pub type Cycle = Vec<ModuleId>;

/// Strongly connected components of size two or more, plus self-loops.
///
/// Components are sorted by their smallest member, so the result does not
/// depend on edge insertion order or on where traversal starts.
pub struct CycleDetectionQuery;

impl CycleDetectionQuery {
    /// Construct a cycle detection query.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for CycleDetectionQuery {
    fn default() -> Self {
        Self
    }
}

// Index-based adjacency over nodes in id order, parallel edges collapsed.
fn adjacency(graph: &ModuleGraph) -> (Vec<&ModuleId>, Vec<Vec<usize>>) {
    let ids: Vec<&ModuleId> = graph.nodes().map(|n| &n.id).collect();
    let index: HashMap<&ModuleId, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for e in graph.edges() {
        if let (Some(&u), Some(&v)) = (index.get(&e.from), index.get(&e.to)) {
            adj[u].push(v);
        }
    }
    for neigh in &mut adj {
        neigh.sort_unstable();
        neigh.dedup();
    }
    (ids, adj)
}

// Iterative Tarjan; an explicit call stack keeps deep import chains off the thread stack.
fn strongly_connected(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNSEEN: usize = usize::MAX;
    let n = adj.len();
    let mut index = vec![UNSEEN; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut call: Vec<(usize, usize)> = Vec::new();
    let mut next = 0usize;
    let mut out = Vec::new();

    for start in 0..n {
        if index[start] != UNSEEN {
            continue;
        }
        index[start] = next;
        low[start] = next;
        next += 1;
        stack.push(start);
        on_stack[start] = true;
        call.push((start, 0));

        while let Some(frame) = call.last_mut() {
            let v = frame.0;
            if frame.1 < adj[v].len() {
                let w = adj[v][frame.1];
                frame.1 += 1;
                if index[w] == UNSEEN {
                    index[w] = next;
                    low[w] = next;
                    next += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
                continue;
            }
            call.pop();
            if let Some(&(parent, _)) = call.last() {
                low[parent] = low[parent].min(low[v]);
            }
            if low[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                out.push(component);
            }
        }
    }
    out
}

impl Query<Vec<Cycle>> for CycleDetectionQuery {
    fn run(&self, graph: &ModuleGraph) -> Vec<Cycle> {
        let (ids, adj) = adjacency(graph);
        let mut cycles: Vec<Cycle> = strongly_connected(&adj)
            .into_iter()
            .filter(|c| c.len() > 1 || adj[c[0]].contains(&c[0]))
            .map(|mut c| {
                c.sort_unstable();
                c.into_iter().map(|i| ids[i].clone()).collect()
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// How an edge contributes to its source's weight distribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropyWeighting {
    /// Number of imported symbols (a bare or wildcard import counts as one).
    #[default]
    Symbols,
    /// Every edge counts as one.
    Edges,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct EntropyReport {
    pub per_node: BTreeMap<ModuleId, f64>,
    /// Mean node entropy weighted by total outgoing weight, over nodes with dependencies.
    pub graph: f64,
}

/// Shannon entropy (base 2) of each node's outgoing weight across distinct neighbours.
///
/// All weight on one neighbour scores 0; `k` equally weighted neighbours score `log2(k)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntropyQuery {
    pub weighting: EntropyWeighting,
}

impl EntropyQuery {
    #[must_use]
    pub fn new(weighting: EntropyWeighting) -> Self {
        Self { weighting }
    }

    fn node_weights(&self, graph: &ModuleGraph, id: &ModuleId) -> BTreeMap<ModuleId, usize> {
        let mut weights: BTreeMap<ModuleId, usize> = BTreeMap::new();
        for e in graph.outgoing_edges(id) {
            let w = match self.weighting {
                EntropyWeighting::Symbols => e.weight(),
                EntropyWeighting::Edges => 1,
            };
            *weights.entry(e.to.clone()).or_default() += w;
        }
        weights
    }
}

#[allow(clippy::cast_precision_loss)]
fn shannon(weights: impl Iterator<Item = usize> + Clone) -> f64 {
    let total: usize = weights.clone().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    weights
        .filter(|&w| w > 0)
        .map(|w| {
            let p = w as f64 / total;
            -p * p.log2()
        })
        .sum::<f64>()
        .max(0.0)
}

impl Query<EntropyReport> for EntropyQuery {
    #[allow(clippy::cast_precision_loss)]
    fn run(&self, graph: &ModuleGraph) -> EntropyReport {
        let mut report = EntropyReport::default();
        let mut weighted_sum = 0.0;
        let mut weight_total = 0usize;
        for node in graph.nodes() {
            let weights = self.node_weights(graph, &node.id);
            let h = shannon(weights.values().copied());
            let out_weight: usize = weights.values().sum();
            if out_weight > 0 {
                weighted_sum += h * out_weight as f64;
                weight_total += out_weight;
            }
            report.per_node.insert(node.id.clone(), h);
        }
        if weight_total > 0 {
            report.graph = weighted_sum / weight_total as f64;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, ModuleNode};
    use crate::parser::ImportedName;
    use std::path::PathBuf;

    fn id(name: &str) -> ModuleId {
        ModuleId(PathBuf::from(format!("/p/{name}")))
    }

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> ModuleGraph {
        let mut g = ModuleGraph::new("/p");
        for n in nodes {
            g.add_node(ModuleNode::new(id(n), "python"));
        }
        for (a, b) in edges {
            g.add_edge(Edge::new(id(a), id(b))).unwrap();
        }
        g.finalize();
        g
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("a", "c"), ("c", "d")]);
        assert!(CycleDetectionQuery::new().run(&g).is_empty());
    }

    #[test]
    fn triangle_is_one_component_regardless_of_insertion_order() {
        let g1 = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let g2 = graph(&["c", "b", "a"], &[("c", "a"), ("b", "c"), ("a", "b")]);
        let c1 = CycleDetectionQuery::new().run(&g1);
        let c2 = CycleDetectionQuery::new().run(&g2);
        assert_eq!(c1, vec![vec![id("a"), id("b"), id("c")]]);
        assert_eq!(c1, c2);
    }

    #[test]
    fn self_loops_and_multiple_components_are_sorted() {
        let g = graph(
            &["a", "b", "x", "y", "z"],
            &[("z", "z"), ("x", "y"), ("y", "x"), ("a", "b"), ("b", "a"), ("b", "x")],
        );
        let cycles = CycleDetectionQuery::new().run(&g);
        assert_eq!(cycles, vec![vec![id("a"), id("b")], vec![id("x"), id("y")], vec![id("z")]]);
    }

    #[test]
    fn single_dependency_has_zero_entropy() {
        let g = graph(&["a", "b"], &[("a", "b")]);
        let r = EntropyQuery::default().run(&g);
        assert!(r.per_node[&id("a")].abs() < 1e-12);
        assert!(r.per_node[&id("b")].abs() < 1e-12);
        assert!(r.graph.abs() < 1e-12);
    }

    #[test]
    fn even_spread_scores_log2_k() {
        let g = graph(&["a", "b", "c", "d", "e"], &[("a", "b"), ("a", "c"), ("a", "d"), ("a", "e")]);
        let r = EntropyQuery::default().run(&g);
        assert!((r.per_node[&id("a")] - 2.0).abs() < 1e-9);
        assert!((r.graph - 2.0).abs() < 1e-9);
    }

    #[test]
    fn weighting_mode_changes_the_distribution() {
        let mut g = graph(&["a", "b", "c"], &[("a", "c")]);
        let mut heavy = Edge::new(id("a"), id("b"));
        for s in ["x", "y", "z"] {
            heavy.imported_symbols.insert(ImportedName::new(s));
        }
        g.add_edge(heavy).unwrap();
        let by_symbols = EntropyQuery::new(EntropyWeighting::Symbols).run(&g);
        let by_edges = EntropyQuery::new(EntropyWeighting::Edges).run(&g);
        // weights 3:1 versus 1:1
        let expected = -(0.75f64 * 0.75f64.log2() + 0.25 * 0.25f64.log2());
        assert!((by_symbols.per_node[&id("a")] - expected).abs() < 1e-9);
        assert!((by_edges.per_node[&id("a")] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn graph_entropy_weights_nodes_by_outgoing_weight() {
        // a spreads 2 edges evenly (h = 1), b has one edge (h = 0)
        let g = graph(&["a", "b", "c", "d"], &[("a", "c"), ("a", "d"), ("b", "c")]);
        let r = EntropyQuery::new(EntropyWeighting::Edges).run(&g);
        assert!((r.graph - 2.0 / 3.0).abs() < 1e-9);
    }
}
