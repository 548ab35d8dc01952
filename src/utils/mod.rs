pub mod table {
    fn sep(widths: &[usize]) -> String {
        let mut s = String::from("+");
        for w in widths {
            s.push_str(&"-".repeat(w + 2));
            s.push('+');
        }
        s
    }

    fn is_numeric(cell: &str) -> bool {
        !cell.is_empty() && cell.parse::<f64>().is_ok()
    }

    // Numbers are right-aligned, everything else left-aligned.
    fn line(cells: &[String], widths: &[usize]) -> String {
        let mut s = String::from("|");
        for (cell, &w) in cells.iter().zip(widths) {
            let pad = " ".repeat(w.saturating_sub(cell.chars().count()));
            s.push(' ');
            if is_numeric(cell) {
                s.push_str(&pad);
                s.push_str(cell);
            } else {
                s.push_str(cell);
                s.push_str(&pad);
            }
            s.push_str(" |");
        }
        s
    }

    /// Render an ASCII table; missing cells are blank.
    #[must_use]
    pub fn render(headers: &[&str], rows: &[Vec<String>]) -> String {
        let cols = headers.len();
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (c, w) in widths.iter_mut().enumerate() {
                *w = (*w).max(row.get(c).map_or(0, |s| s.chars().count()));
            }
        }

        let mut out = String::new();
        out.push_str(&sep(&widths));
        out.push('\n');
        let header_cells: Vec<String> = headers.iter().map(|s| (*s).to_string()).collect();
        out.push_str(&line(&header_cells, &widths));
        out.push('\n');
        out.push_str(&sep(&widths));
        out.push('\n');
        for row in rows {
            let cells: Vec<String> = (0..cols).map(|i| row.get(i).cloned().unwrap_or_default()).collect();
            out.push_str(&line(&cells, &widths));
            out.push('\n');
        }
        out.push_str(&sep(&widths));
        out
    }
}

pub mod config {
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tracing::debug;

    use super::package_json;
    use crate::check::{Policy, RuleSet, RuleSpec};
    use crate::errors::DepTreeError;
    use crate::graph::resolver::ModuleSystemConfig;
    use crate::query::EntropyWeighting;

    pub const CONFIG_FILE_NAME: &str = ".dep-tree.toml";

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct JsConfig {
        /// Follow `compilerOptions.paths` from the root tsconfig.json.
        pub tsconfig_paths: bool,
        /// Resolve package names listed in the root package.json `workspaces`.
        pub workspaces: bool,
        pub aliases: BTreeMap<String, String>,
        pub workspace_roots: Vec<String>,
    }

    impl Default for JsConfig {
        fn default() -> Self {
            Self { tsconfig_paths: true, workspaces: true, aliases: BTreeMap::new(), workspace_roots: Vec::new() }
        }
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct PythonConfig {
        /// Drop imports nested under `if`/`try`/function bodies.
        pub exclude_conditional_imports: bool,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct CheckConfig {
        pub entrypoints: Vec<String>,
        pub allow_circular_dependencies: bool,
        /// Decides edges no rule matches; `deny` unless set to `allow`.
        pub default_policy: Policy,
        pub rules: Vec<RuleSpec>,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct EntropyConfig {
        pub weighting: EntropyWeighting,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct TreeConfig {
        /// Start the explorer with every node visible.
        pub overview: bool,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, deny_unknown_fields)]
    pub struct Config {
        pub exclude: Vec<String>,
        pub unwrap_exports: bool,
        pub js: JsConfig,
        pub python: PythonConfig,
        pub check: CheckConfig,
        pub entropy: EntropyConfig,
        pub tree: TreeConfig,
    }

    /// Printed by the `config` command.
    pub const SAMPLE: &str = r#"# dep-tree configuration

# Files matching these globs are left out of the graph.
exclude = ["**/*.test.ts", "**/__mocks__/**"]

# Follow re-exports to the module that declares the symbol.
unwrap_exports = false

[js]
tsconfig_paths = true
workspaces = true
# aliases = { "@app" = "src" }
# workspace_roots = ["packages/ui"]

[python]
exclude_conditional_imports = false

[entropy]
# "symbols" weighs edges by imported names, "edges" counts each edge once.
weighting = "symbols"

[tree]
overview = false

[check]
entrypoints = ["src/index.ts"]
allow_circular_dependencies = false
# Edges no rule matches are violations; set "allow" to only enforce deny rules.
default_policy = "deny"

[[check.rules]]
policy = "allow"
from = "src/**"
to = "src/**"

[[check.rules]]
policy = "deny"
from = "src/utils/**"
to = "src/features/**"
reason = "utils must not depend on features"
"#;

    impl Config {
        /// Module-system options for a project rooted at `root`, with
        /// tsconfig paths and package.json workspaces discovered when enabled.
        #[must_use]
        pub fn module_system(&self, root: &Path) -> ModuleSystemConfig {
            let mut path_aliases: BTreeMap<String, PathBuf> =
                self.js.aliases.iter().map(|(k, v)| (k.clone(), PathBuf::from(v))).collect();
            if self.js.tsconfig_paths {
                for (k, v) in package_json::tsconfig_paths(root) {
                    path_aliases.entry(k).or_insert(v);
                }
            }
            let mut workspace_roots: Vec<PathBuf> = self.js.workspace_roots.iter().map(PathBuf::from).collect();
            if self.js.workspaces {
                for dir in package_json::workspace_roots(root) {
                    if !workspace_roots.contains(&dir) {
                        workspace_roots.push(dir);
                    }
                }
            }
            ModuleSystemConfig {
                project_root: root.to_path_buf(),
                exclude_globs: self.exclude.clone(),
                follow_path_aliases: !path_aliases.is_empty(),
                follow_workspaces: !workspace_roots.is_empty(),
                path_aliases,
                workspace_roots,
                exclude_conditional_imports: self.python.exclude_conditional_imports,
                unwrap_re_exports: self.unwrap_exports,
            }
        }

        /// Compile the `[check]` rules.
        ///
        /// # Errors
        /// Returns `DepTreeError::Config` for a malformed rule pattern.
        pub fn rule_set(&self) -> Result<RuleSet, DepTreeError> {
            RuleSet::new(self.check.rules.clone(), self.check.default_policy)
        }
    }

    /// Parse a config file.
    ///
    /// # Errors
    /// Returns `DepTreeError::Config` when the file cannot be read or is not valid.
    pub fn load_config_at(path: &Path) -> Result<Config, DepTreeError> {
        let data = fs::read_to_string(path)
            .map_err(|e| DepTreeError::Config(format!("cannot read {}: {e}", path.display())))?;
        let cfg = toml::from_str::<Config>(&data)
            .map_err(|e| DepTreeError::Config(format!("invalid {}: {e}", path.display())))?;
        debug!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Load `.dep-tree.toml` from `root` when present.
    ///
    /// # Errors
    /// Same as [`load_config_at`] for a file that exists but is invalid.
    pub fn load_config_near(root: &Path) -> Result<Option<Config>, DepTreeError> {
        let p = root.join(CONFIG_FILE_NAME);
        if p.is_file() {
            load_config_at(&p).map(Some)
        } else {
            Ok(None)
        }
    }
}

pub mod package_json {
    //! tsconfig `paths` and package.json `workspaces` discovery.
    use globset::{GlobBuilder, GlobSetBuilder};
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use tracing::warn;

    use crate::parser::blank_comments;

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct CompilerOptions {
        base_url: Option<String>,
        #[serde(default)]
        paths: BTreeMap<String, Vec<String>>,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct TsConfig {
        #[serde(default)]
        compiler_options: CompilerOptions,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Workspaces {
        List(Vec<String>),
        Object { packages: Vec<String> },
    }

    #[derive(Deserialize)]
    struct RootManifest {
        workspaces: Option<Workspaces>,
    }

    /// `compilerOptions.paths` of `root/tsconfig.json` as prefix -> absolute
    /// target, using the first target of each entry.
    #[must_use]
    pub fn tsconfig_paths(root: &Path) -> BTreeMap<String, PathBuf> {
        let file = root.join("tsconfig.json");
        let Ok(raw) = std::fs::read_to_string(&file) else {
            return BTreeMap::new();
        };
        let cfg: TsConfig = match serde_json::from_str(&blank_comments(&raw)) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "ignoring unparsable tsconfig");
                return BTreeMap::new();
            }
        };
        let base = root.join(cfg.compiler_options.base_url.as_deref().unwrap_or("."));
        cfg.compiler_options
            .paths
            .into_iter()
            .filter_map(|(prefix, targets)| {
                let first = targets.into_iter().next()?;
                Some((prefix, path_clean::clean(base.join(first))))
            })
            .collect()
    }

    /// Package directories matched by the root package.json `workspaces` globs.
    /// Only directories holding a package.json count.
    #[must_use]
    pub fn workspace_roots(root: &Path) -> Vec<PathBuf> {
        let Ok(raw) = std::fs::read_to_string(root.join("package.json")) else {
            return Vec::new();
        };
        let patterns = match serde_json::from_str::<RootManifest>(&raw) {
            Ok(RootManifest { workspaces: Some(Workspaces::List(p) | Workspaces::Object { packages: p }) }) => p,
            Ok(_) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "ignoring unparsable package.json");
                return Vec::new();
            }
        };
        let mut builder = GlobSetBuilder::new();
        let mut depth = 1;
        for p in &patterns {
            let p = p.trim_start_matches("./").trim_end_matches('/');
            depth = depth.max(p.split('/').count());
            match GlobBuilder::new(p).literal_separator(true).build() {
                Ok(g) => {
                    builder.add(g);
                }
                Err(e) => warn!(pattern = p, error = %e, "skipping workspace pattern"),
            }
        }
        let Ok(set) = builder.build() else { return Vec::new() };
        let mut out: Vec<PathBuf> = ignore::WalkBuilder::new(root)
            .max_depth(Some(depth))
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|t| t.is_dir()))
            .filter(|e| e.path().strip_prefix(root).is_ok_and(|rel| set.is_match(rel)))
            .filter(|e| e.path().join("package.json").is_file())
            .map(ignore::DirEntry::into_path)
            .collect();
        out.sort();
        out
    }
}

pub mod file_walker {
    use std::path::{Path, PathBuf};

    use crate::errors::DepTreeError;
    use crate::graph::resolver::ModuleSystemConfig;
    use crate::parser::is_supported;

    /// Supported source files under `dir`, sorted, honouring `.gitignore` and
    /// `.ignore` unless `no_ignore` is set.
    #[must_use]
    pub fn source_files(dir: &Path, cfg: &ModuleSystemConfig, no_ignore: bool) -> Vec<PathBuf> {
        let mut walker = ignore::WalkBuilder::new(dir);
        walker
            .follow_links(false)
            .git_ignore(!no_ignore)
            .git_global(false)
            .git_exclude(false)
            .ignore(!no_ignore)
            .require_git(false)
            .parents(true);
        let mut out: Vec<PathBuf> = walker
            .build()
            .flatten()
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .map(ignore::DirEntry::into_path)
            .filter(|p| is_supported(p, cfg))
            .collect();
        out.sort();
        out
    }

    /// Turn command-line arguments into absolute entry files; directories
    /// expand to the supported files under them.
    ///
    /// # Errors
    /// Returns `DepTreeError::NoEntryFiles` when nothing usable remains. With
    /// a single bad argument its own message is reported.
    pub fn expand_entries(args: &[PathBuf], cfg: &ModuleSystemConfig, no_ignore: bool) -> Result<Vec<PathBuf>, DepTreeError> {
        let cwd = std::env::current_dir()?;
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for arg in args {
            let abs = path_clean::clean(cwd.join(arg));
            if abs.is_dir() {
                files.extend(source_files(&abs, cfg, no_ignore));
            } else if abs.is_file() {
                files.push(abs);
            } else {
                errors.push(format!("file {} does not exist", arg.display()));
            }
        }
        if files.is_empty() {
            let msg = if errors.len() == 1 { errors.remove(0) } else { "no valid files were provided".to_string() };
            return Err(DepTreeError::NoEntryFiles(msg));
        }
        for e in errors {
            tracing::warn!("{e}");
        }
        Ok(files)
    }
}

pub mod project_root {
    use std::path::{Path, PathBuf};

    use super::config::CONFIG_FILE_NAME;

    const MARKERS: &[&str] =
        &[CONFIG_FILE_NAME, "package.json", "pyproject.toml", "setup.py", "Cargo.toml", ".git"];

    /// Nearest ancestor of `start` (a file or directory) holding a project
    /// marker, or the start directory itself when none does.
    #[must_use]
    pub fn detect(start: &Path) -> PathBuf {
        let start_dir = if start.is_dir() { start } else { start.parent().unwrap_or(start) };
        start_dir
            .ancestors()
            .find(|dir| MARKERS.iter().any(|m| dir.join(m).exists()))
            .unwrap_or(start_dir)
            .to_path_buf()
    }
}
