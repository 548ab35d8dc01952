//! Concurrent graph construction.
//!
//! Every file is one task spawned into a rayon scope on a bounded pool. A
//! worker reads, extracts and resolves its file without touching shared
//! state, then publishes the finished node and its edges under a single
//! mutex. Ids seen for the first time are spawned as new tasks straight away,
//! so idle workers pick them up while slow files are still being parsed. The
//! visited set lives behind the same lock, so a file is processed at most
//! once and import cycles terminate.
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::errors::{DepTreeError, ExtractionError, NodeError, NodeErrorKind};
use crate::graph::resolver::{ExcludeMatcher, ModuleSystemConfig, Resolver};
use crate::graph::{Edge, ModuleGraph, ModuleId, ModuleNode};
use crate::parser::{ImportedName, Language};

/// Cooperative stop signal shared with the caller (e.g. a Ctrl-C handler).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct ReExport {
    target: ModuleId,
    names: BTreeSet<ImportedName>,
}

// Everything one worker learns about one file.
struct Processed {
    id: ModuleId,
    language: String,
    raw_imports: Vec<crate::parser::ImportRecord>,
    errors: Vec<NodeError>,
    edges: Vec<Edge>,
    re_exports: Vec<ReExport>,
}

#[derive(Default)]
struct BuildState {
    graph: ModuleGraph,
    visited: HashSet<ModuleId>,
    re_exports: HashMap<ModuleId, Vec<ReExport>>,
    fatal: Option<DepTreeError>,
}

impl BuildState {
    /// Store a processed file. Returns the ids seen for the first time.
    fn publish(&mut self, p: Processed) -> Vec<ModuleId> {
        let mut discovered = Vec::new();
        match self.graph.node_mut(&p.id) {
            Some(node) => {
                node.language = p.language;
                node.raw_imports = p.raw_imports;
                node.errors = p.errors;
            }
            None => {
                let mut node = ModuleNode::new(p.id.clone(), p.language);
                node.raw_imports = p.raw_imports;
                node.errors = p.errors;
                self.graph.add_node(node);
            }
        }
        for edge in p.edges {
            if self.visited.insert(edge.to.clone()) {
                discovered.push(edge.to.clone());
                self.graph.add_node(ModuleNode::new(edge.to.clone(), String::new()));
            }
            // both endpoints exist at this point
            let _ = self.graph.add_edge(edge);
        }
        if !p.re_exports.is_empty() {
            self.re_exports.insert(p.id, p.re_exports);
        }
        discovered
    }
}

pub struct GraphBuilder {
    language: Arc<dyn Language>,
    resolver: Resolver,
    exclude: ExcludeMatcher,
    root: PathBuf,
    unwrap_re_exports: bool,
    workers: usize,
    cancel: CancelFlag,
}

impl GraphBuilder {
    /// Prepare a builder for one language.
    ///
    /// # Errors
    /// Returns `DepTreeError::Config` when an exclude glob is malformed.
    pub fn new(language: Arc<dyn Language>, config: &ModuleSystemConfig) -> Result<Self, DepTreeError> {
        let exclude = config.exclude_matcher()?;
        let resolver = Resolver::new(Arc::clone(&language), config);
        let workers = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Ok(Self {
            language,
            resolver,
            exclude,
            root: config.project_root.clone(),
            unwrap_re_exports: config.unwrap_re_exports,
            workers,
            cancel: CancelFlag::new(),
        })
    }

    #[must_use]
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    #[must_use]
    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Build the module graph reachable from `entries`.
    ///
    /// # Errors
    /// - `NoEntryFiles` when `entries` is empty or every entry is excluded.
    /// - `EntryRead` when an entry file cannot be read.
    /// - `Cancelled` when the cancel flag is raised mid-build.
    pub fn build(&self, entries: &[PathBuf]) -> Result<ModuleGraph, DepTreeError> {
        if entries.is_empty() {
            return Err(DepTreeError::NoEntryFiles("at least one file must be provided".into()));
        }
        let entry_ids: BTreeSet<ModuleId> = entries
            .iter()
            .map(ModuleId::new)
            .filter(|id| !self.exclude.is_excluded(id.path()))
            .collect();
        if entry_ids.is_empty() {
            return Err(DepTreeError::NoEntryFiles("every entry file is excluded".into()));
        }
        info!(entries = entry_ids.len(), language = self.language.name(), workers = self.workers, "building module graph");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("dep-tree-worker-{i}"))
            .build()
            .map_err(|e| DepTreeError::Io(std::io::Error::other(e)))?;

        let mut state = BuildState { graph: ModuleGraph::new(&self.root), ..BuildState::default() };
        state.graph.entries = entry_ids.iter().cloned().collect();
        for id in &entry_ids {
            state.visited.insert(id.clone());
            state.graph.add_node(ModuleNode::new(id.clone(), self.language.name()));
        }
        let state = Mutex::new(state);

        pool.scope(|scope| {
            for id in &entry_ids {
                self.spawn_file(scope, &state, id.clone(), &entry_ids);
            }
        });
        if self.cancel.is_cancelled() {
            return Err(DepTreeError::Cancelled);
        }

        let BuildState { mut graph, re_exports, fatal, .. } =
            state.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(e) = fatal {
            return Err(e);
        }
        if self.unwrap_re_exports && !re_exports.is_empty() {
            unwrap_re_exports(&mut graph, &re_exports);
        }
        graph.metadata.language = self.language.name().to_string();
        graph.metadata.generated_at = match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => format!("{}", d.as_secs()),
            Err(_) => "0".to_string(),
        };
        graph.finalize();
        info!(
            nodes = graph.node_count(),
            edges = graph.edges().len(),
            with_errors = graph.errors().count(),
            "module graph built"
        );
        Ok(graph)
    }

    // One task per file; ids it discovers are spawned into the same scope.
    fn spawn_file<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        state: &'s Mutex<BuildState>,
        id: ModuleId,
        entries: &'s BTreeSet<ModuleId>,
    ) {
        scope.spawn(move |scope| {
            if self.cancel.is_cancelled() {
                return;
            }
            let result = self.process(&id, entries.contains(&id));
            let discovered = {
                let mut st = state.lock().unwrap_or_else(PoisonError::into_inner);
                if st.fatal.is_some() {
                    return;
                }
                match result {
                    Ok(p) => st.publish(p),
                    Err(e) => {
                        st.fatal = Some(e);
                        return;
                    }
                }
            };
            for next in discovered {
                self.spawn_file(scope, state, next, entries);
            }
        });
    }

    // Read, extract and resolve one file. Only entry read failures are fatal.
    fn process(&self, id: &ModuleId, is_entry: bool) -> Result<Processed, DepTreeError> {
        let path = id.path();
        let mut out = Processed {
            id: id.clone(),
            language: String::new(),
            raw_imports: Vec::new(),
            errors: Vec::new(),
            edges: Vec::new(),
            re_exports: Vec::new(),
        };
        if !self.language.handles(path) {
            return Ok(out);
        }
        out.language = self.language.name().to_string();

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(source) if is_entry => return Err(DepTreeError::EntryRead { path: path.to_path_buf(), source }),
            Err(e) => {
                out.errors.push(NodeError::new(NodeErrorKind::Read, e.to_string()));
                return Ok(out);
            }
        };
        let records = match String::from_utf8(bytes) {
            Ok(content) => self.language.extract(&content),
            Err(_) => Err(ExtractionError::InvalidUtf8),
        };
        let records = match records {
            Ok(r) => r,
            Err(e) => {
                debug!(file = %id, error = %e, "extraction failed");
                out.errors.push(e.into());
                return Ok(out);
            }
        };

        for record in &records {
            match self.resolver.resolve(record, id) {
                Ok(Some(to)) if self.exclude.is_excluded(to.path()) => {}
                Ok(Some(to)) => {
                    if record.is_re_export {
                        out.re_exports
                            .push(ReExport { target: to.clone(), names: record.imported_names.clone() });
                    }
                    out.edges.push(Edge {
                        from: id.clone(),
                        to,
                        imported_symbols: record.imported_names.clone(),
                        is_wildcard: record.is_wildcard,
                    });
                }
                Ok(None) => {}
                Err(e) => out.errors.push(e.into()),
            }
        }
        debug!(file = %id, imports = records.len(), edges = out.edges.len(), "processed");
        out.raw_imports = records;
        Ok(out)
    }
}

/// Redirect edges that import names a module merely re-exports to the module
/// declaring them. Wildcard and symbol-less imports keep their target.
fn unwrap_re_exports(graph: &mut ModuleGraph, table: &HashMap<ModuleId, Vec<ReExport>>) {
    let mut out = Vec::with_capacity(graph.edges().len());
    for edge in graph.edges() {
        if edge.is_wildcard || edge.imported_symbols.is_empty() || !table.contains_key(&edge.to) {
            out.push(edge.clone());
            continue;
        }
        let mut grouped: BTreeMap<ModuleId, BTreeSet<ImportedName>> = BTreeMap::new();
        for sym in &edge.imported_symbols {
            let (dest, name) = follow_re_exports(table, &edge.to, &sym.name);
            grouped.entry(dest).or_default().insert(ImportedName { name, alias: sym.alias.clone() });
        }
        for (to, imported_symbols) in grouped {
            out.push(Edge { from: edge.from.clone(), to, imported_symbols, is_wildcard: false });
        }
    }
    graph.replace_edges(out);
}

fn follow_re_exports(table: &HashMap<ModuleId, Vec<ReExport>>, start: &ModuleId, name: &str) -> (ModuleId, String) {
    let mut current = start.clone();
    let mut name = name.to_string();
    let mut seen = HashSet::new();
    while seen.insert(current.clone()) {
        let hop = table.get(&current).and_then(|exports| {
            exports.iter().find_map(|r| {
                r.names.iter().find(|n| n.local_name() == name).map(|n| (r.target.clone(), n.name.clone()))
            })
        });
        match hop {
            Some((target, original)) => {
                current = target;
                name = original;
            }
            None => break,
        }
    }
    (current, name)
}
