//! Module graph model.
//!
//! This module defines the core data structures for the dependency graph
//! (`ModuleGraph`, `ModuleNode`, `Edge`) keyed by canonical file identity
//! (`ModuleId`), plus the read-only query API used by metrics, the rule
//! checker, exports and the terminal view.
//!
//! You typically construct a graph via `builder::GraphBuilder::build` and then
//! pass it to queries in `crate::query` and `crate::check`.
use crate::errors::{DepTreeError, NodeError};
use crate::parser::{ImportRecord, ImportedName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

pub mod builder;
pub mod resolver;

/// Canonical absolute identity of a source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub PathBuf);

impl ModuleId {
    /// Lexically clean `path` and canonicalize it when it exists on disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let cleaned = path_clean::clean(path.as_ref());
        match std::fs::canonicalize(&cleaned) {
            Ok(canonical) => Self(canonical),
            Err(_) => Self(cleaned),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleNode {
    pub id: ModuleId,
    pub language: String,
    pub raw_imports: Vec<ImportRecord>,
    pub errors: Vec<NodeError>,
}

impl ModuleNode {
    pub fn new(id: ModuleId, language: impl Into<String>) -> Self {
        Self { id, language: language.into(), raw_imports: Vec::new(), errors: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    pub from: ModuleId,
    pub to: ModuleId,
    pub imported_symbols: BTreeSet<ImportedName>,
    pub is_wildcard: bool,
}

impl Edge {
    pub fn new(from: ModuleId, to: ModuleId) -> Self {
        Self { from, to, imported_symbols: BTreeSet::new(), is_wildcard: false }
    }

    /// Number of imported symbols, counting a bare or wildcard import as one.
    #[must_use]
    pub fn weight(&self) -> usize {
        self.imported_symbols.len().max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphMetadata {
    pub language: String,
    pub generated_at: String,
}

/// Nodes keyed by id, an edge multiset and per-id adjacency indexes.
///
/// Every edge endpoint references an existing node. The adjacency indexes hold
/// positions into `edges` and are rebuilt after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModuleGraph {
    pub root: PathBuf,
    pub entries: Vec<ModuleId>,
    nodes: BTreeMap<ModuleId, ModuleNode>,
    edges: Vec<Edge>,
    #[serde(skip, default)]
    outgoing: BTreeMap<ModuleId, Vec<usize>>,
    #[serde(skip, default)]
    incoming: BTreeMap<ModuleId, Vec<usize>>,
    pub metadata: GraphMetadata,
}

impl ModuleGraph {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    /// Insert a node unless one with the same id exists. Returns whether it was new.
    pub fn add_node(&mut self, node: ModuleNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.outgoing.entry(node.id.clone()).or_default();
        self.incoming.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn node_mut(&mut self, id: &ModuleId) -> Option<&mut ModuleNode> {
        self.nodes.get_mut(id)
    }

    /// Add an edge between existing nodes. An edge identical in endpoints and
    /// symbols to one already present is ignored.
    ///
    /// # Errors
    /// Returns `DepTreeError::Config` naming the missing endpoint.
    pub fn add_edge(&mut self, edge: Edge) -> Result<bool, DepTreeError> {
        for end in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(end) {
                return Err(DepTreeError::Config(format!("edge endpoint {end} is not a graph node")));
            }
        }
        if self.outgoing_edges(&edge.from).any(|e| *e == edge) {
            return Ok(false);
        }
        let idx = self.edges.len();
        self.outgoing.entry(edge.from.clone()).or_default().push(idx);
        self.incoming.entry(edge.to.clone()).or_default().push(idx);
        self.edges.push(edge);
        Ok(true)
    }

    /// Replace the whole edge list, keeping only edges whose endpoints exist.
    pub fn replace_edges(&mut self, edges: Vec<Edge>) {
        self.edges.clear();
        for e in edges {
            if self.nodes.contains_key(&e.from) && self.nodes.contains_key(&e.to) && !self.edges.contains(&e) {
                self.edges.push(e);
            }
        }
        self.reindex();
    }

    /// Sort edges by source (stable) so output order does not depend on worker timing.
    pub fn finalize(&mut self) {
        self.edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
        self.entries.sort();
        self.entries.dedup();
        self.reindex();
    }

    fn reindex(&mut self) {
        self.outgoing = self.nodes.keys().map(|k| (k.clone(), Vec::new())).collect();
        self.incoming = self.outgoing.clone();
        for (i, e) in self.edges.iter().enumerate() {
            if let Some(v) = self.outgoing.get_mut(&e.from) {
                v.push(i);
            }
            if let Some(v) = self.incoming.get_mut(&e.to) {
                v.push(i);
            }
        }
    }

    #[must_use]
    pub fn node(&self, id: &ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn outgoing_edges(&self, id: &ModuleId) -> impl Iterator<Item = &Edge> {
        self.outgoing.get(id).into_iter().flatten().map(|&i| &self.edges[i])
    }

    pub fn incoming_edges(&self, id: &ModuleId) -> impl Iterator<Item = &Edge> {
        self.incoming.get(id).into_iter().flatten().map(|&i| &self.edges[i])
    }

    /// Distinct direct dependencies of `id`, sorted.
    #[must_use]
    pub fn dependencies(&self, id: &ModuleId) -> Vec<&ModuleId> {
        let set: BTreeSet<&ModuleId> = self.outgoing_edges(id).map(|e| &e.to).collect();
        set.into_iter().collect()
    }

    /// Distinct direct dependents of `id`, sorted.
    #[must_use]
    pub fn dependents(&self, id: &ModuleId) -> Vec<&ModuleId> {
        let set: BTreeSet<&ModuleId> = self.incoming_edges(id).map(|e| &e.from).collect();
        set.into_iter().collect()
    }

    /// Nodes carrying at least one recorded error, in id order.
    pub fn errors(&self) -> impl Iterator<Item = (&ModuleId, &[NodeError])> {
        self.nodes.values().filter(|n| !n.errors.is_empty()).map(|n| (&n.id, n.errors.as_slice()))
    }

    /// Path of `id` relative to the graph root with `/` separators, or the
    /// full path when it lies outside the root.
    #[must_use]
    pub fn display_name(&self, id: &ModuleId) -> String {
        match id.path().strip_prefix(&self.root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            _ => id.to_string(),
        }
    }

    /// Save the graph as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns `DepTreeError::Json` or `DepTreeError::Io` if serialization or writing fails.
    pub fn save_json(&self, path: &Path) -> Result<(), DepTreeError> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load a graph from a JSON file and rebuild its adjacency indexes.
    ///
    /// This is an explicit import of a `save_json` file. Nothing is compared
    /// against the sources on disk, so a stale export stays stale.
    ///
    /// # Errors
    /// Returns `DepTreeError::Io` if reading fails or `DepTreeError::Json` if the JSON is invalid.
    pub fn load_json(path: &Path) -> Result<Self, DepTreeError> {
        let data = std::fs::read_to_string(path)?;
        let mut graph: ModuleGraph = serde_json::from_str(&data)?;
        graph.reindex();
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(name: &str) -> ModuleId {
        ModuleId(PathBuf::from("/proj").join(name))
    }

    fn graph_with(names: &[&str]) -> ModuleGraph {
        let mut g = ModuleGraph::new("/proj");
        for n in names {
            g.add_node(ModuleNode::new(id(n), "python"));
        }
        g
    }

    #[test]
    fn module_id_cleans_paths() {
        let a = ModuleId::new("/does/not/exist/./x/../y.py");
        assert_eq!(a.path(), Path::new("/does/not/exist/y.py"));
    }

    #[test]
    fn edges_require_existing_nodes() {
        let mut g = graph_with(&["a.py"]);
        assert!(g.add_edge(Edge::new(id("a.py"), id("missing.py"))).is_err());
        assert!(g.edges().is_empty());
    }

    #[test]
    fn identical_edges_are_deduplicated_but_symbol_sets_are_kept_apart() {
        let mut g = graph_with(&["a.py", "b.py"]);
        assert!(g.add_edge(Edge::new(id("a.py"), id("b.py"))).unwrap());
        assert!(!g.add_edge(Edge::new(id("a.py"), id("b.py"))).unwrap());
        let mut with_sym = Edge::new(id("a.py"), id("b.py"));
        with_sym.imported_symbols.insert(ImportedName::new("x"));
        assert!(g.add_edge(with_sym).unwrap());
        assert_eq!(g.edges().len(), 2);
        assert_eq!(g.dependencies(&id("a.py")), vec![&id("b.py")]);
        assert_eq!(g.dependents(&id("b.py")), vec![&id("a.py")]);
    }

    #[test]
    fn edge_weight_counts_symbols_with_floor_of_one() {
        let mut e = Edge::new(id("a.py"), id("b.py"));
        assert_eq!(e.weight(), 1);
        e.imported_symbols.insert(ImportedName::new("x"));
        e.imported_symbols.insert(ImportedName::new("y"));
        assert_eq!(e.weight(), 2);
    }

    #[test]
    fn display_name_is_root_relative() {
        let g = graph_with(&[]);
        assert_eq!(g.display_name(&id("pkg/a.py")), "pkg/a.py");
        assert_eq!(g.display_name(&ModuleId(PathBuf::from("/elsewhere/b.py"))), "/elsewhere/b.py");
    }

    #[test]
    fn json_round_trip_rebuilds_adjacency() {
        let mut g = graph_with(&["a.py", "b.py"]);
        g.add_edge(Edge::new(id("a.py"), id("b.py"))).unwrap();
        g.finalize();
        let td = tempdir().unwrap();
        let file = td.path().join("graph.json");
        g.save_json(&file).unwrap();
        let loaded = ModuleGraph::load_json(&file).unwrap();
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.dependencies(&id("a.py")), vec![&id("b.py")]);
        assert_eq!(loaded.dependents(&id("b.py")), vec![&id("a.py")]);
    }
}
