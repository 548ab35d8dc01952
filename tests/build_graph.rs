use dep_tree::errors::{DepTreeError, NodeErrorKind};
use dep_tree::graph::builder::{CancelFlag, GraphBuilder};
use dep_tree::graph::resolver::ModuleSystemConfig;
use dep_tree::graph::{ModuleGraph, ModuleId};
use dep_tree::parser::infer_language;
use dep_tree::query::{CycleDetectionQuery, Query};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (rel, content) in files {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }
    (dir, root)
}

fn config(root: &Path) -> ModuleSystemConfig {
    ModuleSystemConfig { project_root: root.to_path_buf(), ..Default::default() }
}

fn build(cfg: &ModuleSystemConfig, entries: &[PathBuf]) -> Result<ModuleGraph, DepTreeError> {
    let language = infer_language(entries, cfg)?;
    GraphBuilder::new(language, cfg)?.workers(2).build(entries)
}

fn names(graph: &ModuleGraph) -> Vec<String> {
    graph.nodes().map(|n| graph.display_name(&n.id)).collect()
}

fn edge_names(graph: &ModuleGraph) -> Vec<(String, String)> {
    graph.edges().iter().map(|e| (graph.display_name(&e.from), graph.display_name(&e.to))).collect()
}

#[test]
fn python_cycle_is_traversed_once_and_detected() {
    let (_d, root) = project(&[
        ("main.py", "import a\n"),
        ("a.py", "import b\n"),
        ("b.py", "import a\nimport os\n"),
    ]);
    let g = build(&config(&root), &[root.join("main.py")]).unwrap();
    assert_eq!(names(&g), vec!["a.py", "b.py", "main.py"]);
    assert_eq!(
        edge_names(&g),
        vec![("a.py".into(), "b.py".into()), ("b.py".into(), "a.py".into()), ("main.py".into(), "a.py".into())]
    );
    let cycles = CycleDetectionQuery::new().run(&g);
    assert_eq!(cycles, vec![vec![ModuleId::new(root.join("a.py")), ModuleId::new(root.join("b.py"))]]);
    assert_eq!(g.metadata.language, "python");
}

#[test]
fn unresolved_and_malformed_imports_stay_on_their_node() {
    let (_d, root) = project(&[
        ("pkg/__init__.py", ""),
        ("pkg/main.py", "from .missing import thing\nfrom .helper import run\n"),
        ("pkg/helper.py", "from os import (path,\n"),
    ]);
    let g = build(&config(&root), &[root.join("pkg/main.py")]).unwrap();
    let main = g.node(&ModuleId::new(root.join("pkg/main.py"))).unwrap();
    assert_eq!(main.errors.len(), 1);
    assert_eq!(main.errors[0].kind, NodeErrorKind::UnresolvedImport);
    assert!(main.errors[0].message.contains("missing"));

    // the file with broken syntax is still a node, with its own error
    let helper = g.node(&ModuleId::new(root.join("pkg/helper.py"))).unwrap();
    assert_eq!(helper.errors.len(), 1);
    assert_eq!(helper.errors[0].kind, NodeErrorKind::Extraction);
    assert_eq!(g.errors().count(), 2);
    assert_eq!(g.edges().len(), 1);
}

#[test]
fn js_relative_index_and_external_imports() {
    let (_d, root) = project(&[
        ("src/index.ts", "import React from 'react';\nimport { a } from './a';\nimport { Button } from './ui';\n"),
        ("src/a.ts", "export const a = 1;\n"),
        ("src/ui/index.tsx", "import { a } from '../a';\nexport const Button = () => a;\n"),
    ]);
    let g = build(&config(&root), &[root.join("src/index.ts")]).unwrap();
    assert_eq!(names(&g), vec!["src/a.ts", "src/index.ts", "src/ui/index.tsx"]);
    assert_eq!(g.edges().len(), 3);
    assert!(g.errors().next().is_none());
}

#[test]
fn excluded_files_are_never_visited() {
    let (_d, root) = project(&[
        ("src/index.ts", "import './a';\nimport './gen/schema';\n"),
        ("src/a.ts", ""),
        ("src/gen/schema.ts", "import '../a';\n"),
    ]);
    let mut cfg = config(&root);
    cfg.exclude_globs = vec!["src/gen/**".to_string()];
    let g = build(&cfg, &[root.join("src/index.ts")]).unwrap();
    assert_eq!(names(&g), vec!["src/a.ts", "src/index.ts"]);
}

#[test]
fn re_exports_are_unwrapped_to_the_declaring_module() {
    let files = [
        ("index.ts", "import { helper } from './lib';\n"),
        ("lib/index.ts", "export { helper } from './helper';\n"),
        ("lib/helper.ts", "export const helper = 1;\n"),
    ];
    let (_d, root) = project(&files);
    let mut cfg = config(&root);
    let plain = build(&cfg, &[root.join("index.ts")]).unwrap();
    assert!(edge_names(&plain).contains(&("index.ts".into(), "lib/index.ts".into())));

    cfg.unwrap_re_exports = true;
    let unwrapped = build(&cfg, &[root.join("index.ts")]).unwrap();
    let edges = edge_names(&unwrapped);
    assert!(edges.contains(&("index.ts".into(), "lib/helper.ts".into())));
    assert!(!edges.contains(&("index.ts".into(), "lib/index.ts".into())));
}

#[test]
fn rust_modules_and_crate_paths() {
    let (_d, root) = project(&[
        ("Cargo.toml", "[package]\nname = \"x\"\n"),
        ("src/main.rs", "mod config;\nmod net;\nuse crate::config::Settings;\nuse std::io;\n"),
        ("src/config.rs", "pub struct Settings;\n"),
        ("src/net/mod.rs", "mod client;\n"),
        ("src/net/client.rs", "use super::super::config::Settings;\n"),
    ]);
    let g = build(&config(&root), &[root.join("src/main.rs")]).unwrap();
    assert_eq!(names(&g), vec!["src/config.rs", "src/main.rs", "src/net/client.rs", "src/net/mod.rs"]);
    assert!(edge_names(&g).contains(&("src/net/client.rs".into(), "src/config.rs".into())));
    assert!(g.errors().next().is_none());
}

#[test]
fn missing_entry_file_is_fatal() {
    let (_d, root) = project(&[("a.py", "")]);
    let err = build(&config(&root), &[root.join("nope.py")]).unwrap_err();
    assert!(matches!(err, DepTreeError::EntryRead { .. }));
}

#[test]
fn malformed_exclude_glob_is_rejected_before_building() {
    let (_d, root) = project(&[("a.py", "")]);
    let mut cfg = config(&root);
    cfg.exclude_globs = vec!["src/[".to_string()];
    let err = build(&cfg, &[root.join("a.py")]).unwrap_err();
    assert!(matches!(err, DepTreeError::Config(_)));
}

#[test]
fn unsupported_entries_are_rejected() {
    let (_d, root) = project(&[("notes.txt", "")]);
    let err = build(&config(&root), &[root.join("notes.txt")]).unwrap_err();
    assert!(matches!(err, DepTreeError::NoEntryFiles(_)));
}

#[test]
fn cancelled_builds_return_cancelled() {
    let (_d, root) = project(&[("a.py", "import b\n"), ("b.py", "")]);
    let cfg = config(&root);
    let entries = [root.join("a.py")];
    let flag = CancelFlag::new();
    flag.cancel();
    let language = infer_language(&entries, &cfg).unwrap();
    let err = GraphBuilder::new(language, &cfg).unwrap().cancel_flag(flag).build(&entries).unwrap_err();
    assert!(matches!(err, DepTreeError::Cancelled));
}

#[test]
fn worker_count_does_not_change_the_graph() {
    let mut files = vec![("main.py".to_string(), String::new())];
    let mut main = String::new();
    for i in 0..30 {
        main.push_str(&format!("import m{i}\n"));
        files.push((format!("m{i}.py"), format!("import m{}\n", (i + 7) % 30)));
    }
    files[0].1 = main;
    let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let (_d, root) = project(&refs);
    let cfg = config(&root);
    let entries = [root.join("main.py")];
    let lang = infer_language(&entries, &cfg).unwrap();
    let one = GraphBuilder::new(lang.clone(), &cfg).unwrap().workers(1).build(&entries).unwrap();
    let many = GraphBuilder::new(lang, &cfg).unwrap().workers(8).build(&entries).unwrap();
    assert_eq!(edge_names(&one), edge_names(&many));
    assert_eq!(one.node_count(), 31);
}

#[test]
fn cycle_is_reported_the_same_from_any_entry() {
    let (_d, root) = project(&[("a.py", "import b\n"), ("b.py", "import c\n"), ("c.py", "import a\n")]);
    let cfg = config(&root);
    let expected = vec![vec![ModuleId::new(root.join("a.py")), ModuleId::new(root.join("b.py")), ModuleId::new(root.join("c.py"))]];
    for entry in ["a.py", "b.py", "c.py"] {
        let g = build(&cfg, &[root.join(entry)]).unwrap();
        assert_eq!(g.node_count(), 3, "entry {entry}");
        assert_eq!(CycleDetectionQuery::new().run(&g), expected, "entry {entry}");
    }
}
