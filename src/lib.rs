//! dep-tree: file-level dependency graphs for JavaScript/TypeScript, Python and Rust.
//!
//! Build the graph reachable from a set of entry files, then measure it
//! (cycles, Shannon entropy), check it against allow/deny rules, export it,
//! or explore it in an interactive terminal view.
//!
//! # Features
//! - Regex based import extraction per language, with relative, aliased and
//!   workspace-package resolution
//! - Concurrent graph building on a bounded thread pool; per-file errors are
//!   recorded on the node instead of aborting the run
//! - Strongly connected components and entropy metrics
//! - Glob rules with most-specific-wins semantics
//! - JSON and Graphviz DOT export
//!
//! # Quickstart (Library)
//! ```no_run
//! use dep_tree::graph::builder::GraphBuilder;
//! use dep_tree::graph::resolver::ModuleSystemConfig;
//! use dep_tree::parser::infer_language;
//! use dep_tree::query::{CycleDetectionQuery, Query};
//!
//! let cfg = ModuleSystemConfig { project_root: ".".into(), ..Default::default() };
//! let entries = vec![std::path::PathBuf::from("src/index.ts")];
//! let language = infer_language(&entries, &cfg).expect("supported language");
//! let graph = GraphBuilder::new(language, &cfg).expect("valid config").build(&entries).expect("build graph");
//! println!("files: {} cycles: {}", graph.node_count(), CycleDetectionQuery::new().run(&graph).len());
//! ```
//!
//! # Quickstart (CLI)
//! ```text
//! dep-tree src/index.ts
//! dep-tree check --format json
//! dep-tree tree main.py --unwrap-exports
//! ```
pub mod app;
pub mod check;
pub mod cli;
pub mod errors;
pub mod graph;
pub mod logger;
pub mod parser;
pub mod query;
pub mod tui;
pub mod utils;
pub mod visualization;
