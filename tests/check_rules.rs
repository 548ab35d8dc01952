use dep_tree::check::{CheckQuery, Policy};
use dep_tree::errors::DepTreeError;
use dep_tree::graph::builder::GraphBuilder;
use dep_tree::graph::ModuleGraph;
use dep_tree::parser::infer_language;
use dep_tree::query::Query;
use dep_tree::utils::config::{load_config_at, Config};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PROJECT: &[(&str, &str)] = &[
    ("src/index.ts", "import { fmt } from './utils/fmt';\nimport { cart } from './features/cart';\n"),
    ("src/utils/fmt.ts", "import { price } from '../features/cart/price';\nexport const fmt = 1;\n"),
    ("src/features/cart/index.ts", "import { fmt } from '../../utils/fmt';\nexport const cart = 1;\n"),
    ("src/features/cart/price.ts", "export const price = 1;\n"),
];

fn project(config: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    for (rel, content) in PROJECT {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }
    fs::write(root.join(".dep-tree.toml"), config).unwrap();
    (dir, root)
}

fn build(root: &Path, cfg: &Config) -> ModuleGraph {
    let ms = cfg.module_system(root);
    let entries: Vec<PathBuf> = cfg.check.entrypoints.iter().map(|e| root.join(e)).collect();
    let language = infer_language(&entries, &ms).unwrap();
    GraphBuilder::new(language, &ms).unwrap().build(&entries).unwrap()
}

#[test]
fn deny_rule_flags_the_offending_edge() {
    let (_d, root) = project(
        r#"
[check]
entrypoints = ["src/index.ts"]
allow_circular_dependencies = true
default_policy = "allow"

[[check.rules]]
policy = "deny"
from = "src/utils/**"
to = "src/features/**"
reason = "utils must not depend on features"
"#,
    );
    let cfg = load_config_at(&root.join(".dep-tree.toml")).unwrap();
    let graph = build(&root, &cfg);
    let report = CheckQuery { rules: cfg.rule_set().unwrap(), allow_circular_dependencies: true }.run(&graph);
    assert_eq!(report.violations.len(), 1);
    let v = &report.violations[0];
    assert_eq!(v.from, "src/utils/fmt.ts");
    assert_eq!(v.to, "src/features/cart/price.ts");
    assert_eq!(v.reason, "utils must not depend on features");
    assert_eq!(v.rule, Some(0));
    assert!(report.cycles.is_empty());
}

#[test]
fn edges_without_an_allow_rule_fail_by_default() {
    let (_d, root) = project(
        r#"
[check]
entrypoints = ["src/index.ts"]
allow_circular_dependencies = true

[[check.rules]]
policy = "allow"
from = "src/*"
to = "src/utils/*"
"#,
    );
    let cfg = load_config_at(&root.join(".dep-tree.toml")).unwrap();
    assert_eq!(cfg.check.default_policy, Policy::Deny);
    let graph = build(&root, &cfg);
    let report = CheckQuery { rules: cfg.rule_set().unwrap(), allow_circular_dependencies: true }.run(&graph);
    let denied: Vec<(&str, &str)> = report.violations.iter().map(|v| (v.from.as_str(), v.to.as_str())).collect();
    assert_eq!(
        denied,
        vec![("src/index.ts", "src/features/cart/index.ts"), ("src/utils/fmt.ts", "src/features/cart/price.ts")]
    );
    assert!(report.violations.iter().all(|v| v.rule.is_none()));
}

#[test]
fn circular_dependencies_fail_the_check_unless_allowed() {
    let (_d, root) = project(
        r#"
[check]
entrypoints = ["src/features/cart/index.ts"]
default_policy = "allow"
"#,
    );
    fs::write(root.join("src/features/cart/price.ts"), "import { cart } from './index';\nexport const price = 1;\n").unwrap();
    fs::write(root.join("src/features/cart/index.ts"), "import { price } from './price';\nexport const cart = 1;\n").unwrap();
    let cfg = load_config_at(&root.join(".dep-tree.toml")).unwrap();
    let graph = build(&root, &cfg);

    let strict = CheckQuery { rules: cfg.rule_set().unwrap(), allow_circular_dependencies: false }.run(&graph);
    assert_eq!(
        strict.cycles,
        vec![vec!["src/features/cart/index.ts".to_string(), "src/features/cart/price.ts".to_string()]]
    );
    assert!(!strict.is_clean());

    let lax = CheckQuery { rules: cfg.rule_set().unwrap(), allow_circular_dependencies: true }.run(&graph);
    assert!(lax.is_clean());
}

#[test]
fn malformed_rule_glob_is_a_config_error() {
    let (_d, root) = project(
        r#"
[[check.rules]]
policy = "deny"
from = "src/[utils"
to = "**"
"#,
    );
    let cfg = load_config_at(&root.join(".dep-tree.toml")).unwrap();
    assert!(matches!(cfg.rule_set(), Err(DepTreeError::Config(_))));
}

#[test]
fn allow_only_config_rejects_an_edge_outside_its_rules() {
    let dir = tempfile::tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("vendor")).unwrap();
    fs::write(root.join("src/a.ts"), "import { x } from '../vendor/x';\n").unwrap();
    fs::write(root.join("vendor/x.ts"), "export const x = 1;\n").unwrap();
    fs::write(
        root.join(".dep-tree.toml"),
        "[check]\nentrypoints = [\"src/a.ts\"]\n\n[[check.rules]]\npolicy = \"allow\"\nfrom = \"src/*\"\nto = \"src/*\"\n",
    )
    .unwrap();
    let cfg = load_config_at(&root.join(".dep-tree.toml")).unwrap();
    let graph = build(&root, &cfg);
    assert_eq!(graph.edges().len(), 1);
    let report = CheckQuery { rules: cfg.rule_set().unwrap(), allow_circular_dependencies: false }.run(&graph);
    assert_eq!(report.violations.len(), 1);
    assert_eq!((report.violations[0].from.as_str(), report.violations[0].to.as_str()), ("src/a.ts", "vendor/x.ts"));
    assert_eq!(report.violations[0].rule, None);
}
