use dep_tree::errors::DepTreeError;
use dep_tree::graph::builder::GraphBuilder;
use dep_tree::parser::infer_language;
use dep_tree::query::EntropyWeighting;
use dep_tree::utils::config::{load_config_at, load_config_near, Config, CONFIG_FILE_NAME};
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

#[test]
fn missing_config_file_is_not_an_error() {
    let (_d, root) = project(&[]);
    assert!(load_config_near(&root).unwrap().is_none());
    let cfg = Config::default();
    assert!(cfg.js.tsconfig_paths);
    assert!(cfg.js.workspaces);
    assert!(!cfg.unwrap_exports);
    assert_eq!(cfg.entropy.weighting, EntropyWeighting::Symbols);
}

#[test]
fn partial_config_keeps_defaults_for_the_rest() {
    let (_d, root) = project(&[(
        CONFIG_FILE_NAME,
        "unwrap_exports = true\nexclude = [\"**/*.spec.ts\"]\n\n[entropy]\nweighting = \"edges\"\n",
    )]);
    let cfg = load_config_near(&root).unwrap().unwrap();
    assert!(cfg.unwrap_exports);
    assert_eq!(cfg.exclude, vec!["**/*.spec.ts".to_string()]);
    assert_eq!(cfg.entropy.weighting, EntropyWeighting::Edges);
    assert!(cfg.js.workspaces);
    assert!(cfg.check.rules.is_empty());
}

#[test]
fn invalid_files_are_config_errors() {
    let (_d, root) = project(&[("broken.toml", "exclude = [\n"), ("typo.toml", "unwrap_export = true\n")]);
    for name in ["broken.toml", "typo.toml", "absent.toml"] {
        let err = load_config_at(&root.join(name)).unwrap_err();
        assert!(matches!(err, DepTreeError::Config(_)), "{name}: {err}");
    }
}

#[test]
fn module_system_merges_aliases_tsconfig_and_workspaces() {
    let (_d, root) = project(&[
        ("tsconfig.json", r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "@app/*": ["src/app/*"] } } }"#),
        ("package.json", r#"{ "workspaces": { "packages": ["packages/*"] } }"#),
        ("packages/ui/package.json", r#"{ "name": "@acme/ui", "main": "src/index.ts" }"#),
        ("packages/ui/src/index.ts", "export const Button = 1;\n"),
    ]);
    let mut cfg: Config = toml::from_str("[js]\naliases = { \"~\" = \"src\" }\n").unwrap();
    let ms = cfg.module_system(&root);
    assert!(ms.follow_path_aliases);
    assert!(ms.follow_workspaces);
    assert_eq!(ms.path_aliases["~"], PathBuf::from("src"));
    assert_eq!(ms.path_aliases["@app/*"], root.join("src/app/*"));
    assert_eq!(ms.workspace_roots, vec![root.join("packages/ui")]);

    cfg.js.tsconfig_paths = false;
    cfg.js.workspaces = false;
    let ms = cfg.module_system(&root);
    assert_eq!(ms.path_aliases.len(), 1);
    assert!(!ms.follow_workspaces);
}

fn build_from(root: &Path, cfg: &Config, entry: &str) -> Vec<(String, String)> {
    let ms = cfg.module_system(root);
    let entries = [root.join(entry)];
    let language = infer_language(&entries, &ms).unwrap();
    let g = GraphBuilder::new(language, &ms).unwrap().build(&entries).unwrap();
    g.edges().iter().map(|e| (g.display_name(&e.from), g.display_name(&e.to))).collect()
}

#[test]
fn workspace_packages_and_tsconfig_paths_resolve_to_files() {
    let (_d, root) = project(&[
        ("tsconfig.json", r#"{ "compilerOptions": { "paths": { "@app/*": ["src/app/*"] } } }"#),
        ("package.json", r#"{ "workspaces": ["packages/*"] }"#),
        ("packages/ui/package.json", r#"{ "name": "@acme/ui", "main": "src/index.ts" }"#),
        ("packages/ui/src/index.ts", "export const Button = 1;\n"),
        ("src/app/store.ts", "export const store = 1;\n"),
        ("src/main.ts", "import { Button } from '@acme/ui';\nimport { store } from '@app/store';\n"),
    ]);
    let edges = build_from(&root, &Config::default(), "src/main.ts");
    assert_eq!(
        edges,
        vec![
            ("src/main.ts".to_string(), "packages/ui/src/index.ts".to_string()),
            ("src/main.ts".to_string(), "src/app/store.ts".to_string()),
        ]
    );
}

#[test]
fn configured_excludes_drop_files_from_the_graph() {
    let (_d, root) = project(&[
        ("main.py", "import util\nimport util_test\n"),
        ("util.py", ""),
        ("util_test.py", ""),
    ]);
    let cfg: Config = toml::from_str("exclude = [\"*_test.py\"]\n").unwrap();
    let edges = build_from(&root, &cfg, "main.py");
    assert_eq!(edges, vec![("main.py".to_string(), "util.py".to_string())]);
}
