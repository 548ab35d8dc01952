use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::errors::{DepTreeError, UnresolvedImportError};
use crate::graph::ModuleId;
use crate::parser::{ImportRecord, Language};

/// Module-system options threaded through the builder and resolver.
#[derive(Debug, Clone, Default)]
pub struct ModuleSystemConfig {
    pub project_root: PathBuf,
    pub exclude_globs: Vec<String>,
    /// Specifier prefix -> target path (tsconfig `paths` style; a trailing `/*` is ignored).
    pub path_aliases: BTreeMap<String, PathBuf>,
    /// Package directories importable by their package name.
    pub workspace_roots: Vec<PathBuf>,
    pub follow_path_aliases: bool,
    pub follow_workspaces: bool,
    pub exclude_conditional_imports: bool,
    pub unwrap_re_exports: bool,
}

impl ModuleSystemConfig {
    /// Compile the exclude globs.
    ///
    /// # Errors
    /// Returns `DepTreeError::Config` for a malformed pattern.
    pub fn exclude_matcher(&self) -> Result<ExcludeMatcher, DepTreeError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_globs {
            let glob = GlobBuilder::new(pattern.trim_start_matches("./"))
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    DepTreeError::Config(format!("exclude pattern '{pattern}' is not correctly formatted: {e}"))
                })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| DepTreeError::Config(e.to_string()))?;
        Ok(ExcludeMatcher { set, root: self.project_root.clone() })
    }
}

/// Exclude globs matched against both the absolute path and the path relative
/// to the project root.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
    root: PathBuf,
}

impl ExcludeMatcher {
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }
        self.set.is_match(path) || path.strip_prefix(&self.root).is_ok_and(|rel| self.set.is_match(rel))
    }
}

#[derive(Debug, Clone)]
struct AliasEntry {
    prefix: String,
    target: PathBuf,
    // package entry point used when the bare package name is imported
    entry: Option<PathBuf>,
}

#[derive(Deserialize)]
struct PackageManifest {
    name: Option<String>,
    main: Option<String>,
    module: Option<String>,
}

/// Turns an import record plus the importing file into a module id.
pub struct Resolver {
    language: Arc<dyn Language>,
    source_root: PathBuf,
    aliases: Vec<AliasEntry>,
}

impl Resolver {
    #[must_use]
    pub fn new(language: Arc<dyn Language>, config: &ModuleSystemConfig) -> Self {
        let root = &config.project_root;
        let mut aliases = Vec::new();
        if config.follow_path_aliases {
            for (prefix, target) in &config.path_aliases {
                let prefix = prefix.trim_end_matches('*').trim_end_matches('/').to_string();
                let target_str = target.to_string_lossy();
                let target = PathBuf::from(target_str.trim_end_matches('*').trim_end_matches('/'));
                let target = if target.is_absolute() { target } else { root.join(target) };
                aliases.push(AliasEntry { prefix, target, entry: None });
            }
        }
        if config.follow_workspaces {
            for dir in &config.workspace_roots {
                let dir = if dir.is_absolute() { dir.clone() } else { root.join(dir) };
                let manifest = std::fs::read_to_string(dir.join("package.json"))
                    .ok()
                    .and_then(|s| serde_json::from_str::<PackageManifest>(&s).ok());
                let name = manifest
                    .as_ref()
                    .and_then(|m| m.name.clone())
                    .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()));
                let Some(name) = name else { continue };
                let entry = manifest.and_then(|m| m.module.or(m.main)).map(|e| dir.join(e));
                debug!(package = %name, dir = %dir.display(), "workspace package");
                aliases.push(AliasEntry { prefix: name, target: dir, entry });
            }
        }
        aliases.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        let source_root = language.source_root(root);
        Self { language, source_root, aliases }
    }

    #[must_use]
    pub fn language(&self) -> &Arc<dyn Language> {
        &self.language
    }

    fn match_alias(&self, specifier: &str) -> Option<(&AliasEntry, Vec<String>)> {
        self.aliases.iter().find_map(|a| {
            let rest = if a.prefix.is_empty() {
                specifier
            } else if specifier == a.prefix {
                ""
            } else {
                specifier.strip_prefix(a.prefix.as_str())?.strip_prefix('/')?
            };
            Some((a, rest.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()))
        })
    }

    /// Resolve `record` imported from `from`.
    ///
    /// `Ok(None)` means the import names something outside the project (a
    /// third-party package, or an item of the importing module itself).
    ///
    /// # Errors
    /// Returns `UnresolvedImportError` when no candidate file exists and the
    /// specifier does not look like an external package.
    pub fn resolve(
        &self,
        record: &ImportRecord,
        from: &ModuleId,
    ) -> Result<Option<ModuleId>, UnresolvedImportError> {
        let unresolved = || UnresolvedImportError { specifier: record.specifier(), from: from.0.clone() };

        let (base, segments) = if record.relative_depth > 0 {
            let mut dir = self.language.module_dir(from.path());
            for _ in 1..record.relative_depth {
                if !dir.pop() {
                    return Err(unresolved());
                }
            }
            (dir, record.path.clone())
        } else if let Some((alias, rest)) = self.match_alias(&record.path.join("/")) {
            if rest.is_empty() {
                if let Some(entry) = alias.entry.as_ref().and_then(|e| self.lookup(e)) {
                    return Ok(Some(ModuleId::new(entry)));
                }
            }
            (alias.target.clone(), rest)
        } else if let Some(rooted) = self.language.rooted_segments(record) {
            (self.source_root.clone(), rooted.to_vec())
        } else {
            return if self.language.is_external(record) { Ok(None) } else { Err(unresolved()) };
        };

        let min = if self.language.allows_partial_paths() { 0 } else { segments.len() };
        for k in (min..=segments.len()).rev() {
            let candidate = segments[..k].iter().fold(base.clone(), |p, s| p.join(s));
            if let Some(found) = self.lookup(&candidate) {
                let id = ModuleId::new(found);
                if k < segments.len() && id == *from {
                    return Ok(None);
                }
                return Ok(Some(id));
            }
        }

        if record.relative_depth == 0 && self.language.is_external(record) {
            Ok(None)
        } else {
            Err(unresolved())
        }
    }

    // exact file, then each known extension appended, then a directory index file
    fn lookup(&self, candidate: &Path) -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate.to_path_buf());
        }
        for ext in self.language.extensions() {
            let mut with_ext = candidate.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(ext);
            let p = PathBuf::from(with_ext);
            if p.is_file() {
                return Some(p);
            }
        }
        if candidate.is_dir() {
            for index in self.language.index_files() {
                for ext in self.language.extensions() {
                    let p = candidate.join(format!("{index}.{ext}"));
                    if p.is_file() {
                        return Some(p);
                    }
                }
            }
        }
        None
    }
}
