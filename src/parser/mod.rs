//! Import extraction.
//!
//! Every supported language implements [`Language`], a small capability
//! interface: which extensions it owns, how its files name their index
//! module, and how raw file text becomes a list of [`ImportRecord`]s. The
//! graph builder treats all languages uniformly through this trait.
use crate::errors::{DepTreeError, ExtractionError};
use crate::graph::resolver::ModuleSystemConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod js;
pub mod python;
pub mod rust;

pub use js::JsLanguage;
pub use python::PythonLanguage;
pub use rust::RustLanguage;

/// A single imported symbol, optionally renamed at the import site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImportedName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ImportedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), alias: None }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name under which the symbol is visible in the importing module.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// One normalized import (or re-export) statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ImportRecord {
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Leading relative markers; 0 means absolute, 1 means "same directory".
    pub relative_depth: usize,
    pub imported_names: BTreeSet<ImportedName>,
    pub is_wildcard: bool,
    pub is_conditional: bool,
    /// The statement re-exports what it imports (`export … from`, `pub use`).
    #[serde(default)]
    pub is_re_export: bool,
    #[serde(default)]
    pub line: usize,
}

impl ImportRecord {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { path: path.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    #[must_use]
    pub fn relative(mut self, depth: usize) -> Self {
        self.relative_depth = depth;
        self
    }

    #[must_use]
    pub fn with_names<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = ImportedName>,
    {
        self.imported_names.extend(names);
        self
    }

    #[must_use]
    pub fn wildcard(mut self) -> Self {
        self.is_wildcard = true;
        self
    }

    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Human readable specifier: `./a/b`, `../a`, `pkg/sub`.
    #[must_use]
    pub fn specifier(&self) -> String {
        let joined = self.path.join("/");
        match self.relative_depth {
            0 => joined,
            1 if joined.is_empty() => ".".to_string(),
            1 => format!("./{joined}"),
            d => {
                let up = "../".repeat(d - 1);
                if joined.is_empty() {
                    up.trim_end_matches('/').to_string()
                } else {
                    format!("{up}{joined}")
                }
            }
        }
    }
}

/// Capability interface implemented once per supported language.
pub trait Language: Send + Sync {
    fn name(&self) -> &'static str;

    /// Known extensions, in resolution priority order.
    fn extensions(&self) -> &'static [&'static str];

    /// File stems that make a directory importable (`index`, `__init__`, `mod`).
    fn index_files(&self) -> &'static [&'static str];

    /// Extract import statements from file content.
    ///
    /// # Errors
    /// Returns `ExtractionError` when an import statement is malformed.
    fn extract(&self, content: &str) -> Result<Vec<ImportRecord>, ExtractionError>;

    /// Directory relative imports of `file` start from.
    fn module_dir(&self, file: &Path) -> PathBuf {
        file.parent().map(Path::to_path_buf).unwrap_or_default()
    }

    /// Directory absolute (non-aliased) specifiers are rooted at.
    fn source_root(&self, project_root: &Path) -> PathBuf {
        project_root.to_path_buf()
    }

    /// Segments of an absolute record below the source root, or `None` when the
    /// record can only name something outside the project.
    fn rooted_segments<'r>(&self, record: &'r ImportRecord) -> Option<&'r [String]> {
        Some(&record.path)
    }

    /// Whether an unresolvable record follows the third-party package convention.
    fn is_external(&self, record: &ImportRecord) -> bool {
        record.relative_depth == 0
    }

    /// Import paths may name items inside a module, so shorter prefixes are tried.
    fn allows_partial_paths(&self) -> bool {
        false
    }

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions().contains(&e))
    }
}

/// All language implementations, configured from the module-system options.
#[must_use]
pub fn all_languages(cfg: &ModuleSystemConfig) -> Vec<Arc<dyn Language>> {
    vec![
        Arc::new(JsLanguage::new()),
        Arc::new(PythonLanguage::new(cfg.exclude_conditional_imports)),
        Arc::new(RustLanguage::new()),
    ]
}

/// Whether any supported language claims `path`.
#[must_use]
pub fn is_supported(path: &Path, cfg: &ModuleSystemConfig) -> bool {
    all_languages(cfg).iter().any(|l| l.handles(path))
}

/// Pick the language for a set of entry files by majority extension.
///
/// The first language to reach the highest score wins ties.
///
/// # Errors
/// Returns `DepTreeError::NoEntryFiles` when no file has a supported extension.
pub fn infer_language(
    files: &[PathBuf],
    cfg: &ModuleSystemConfig,
) -> Result<Arc<dyn Language>, DepTreeError> {
    let languages = all_languages(cfg);
    let mut scores = vec![0usize; languages.len()];
    let mut top: Option<(usize, usize)> = None;
    for file in files {
        let Some(i) = languages.iter().position(|l| l.handles(file)) else {
            continue;
        };
        scores[i] += 1;
        if top.map_or(true, |(_, v)| scores[i] > v) {
            top = Some((i, scores[i]));
        }
    }
    match top {
        Some((i, _)) => Ok(Arc::clone(&languages[i])),
        None => Err(DepTreeError::NoEntryFiles(match files.first() {
            Some(f) => format!("file \"{}\" is not supported", f.display()),
            None => "at least one file must be provided".to_string(),
        })),
    }
}

// 1-based line number of a byte offset
pub(crate) fn line_number_for(content: &str, byte_idx: usize) -> usize {
    content[..byte_idx.min(content.len())].bytes().filter(|&b| b == b'\n').count() + 1
}

/// Replace `//` and `/* */` comments with spaces, keeping byte offsets and
/// newlines intact so match positions still map to source lines.
pub(crate) fn blank_comments(src: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }
    let mut out = String::with_capacity(src.len());
    let mut state = State::Code;
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::Line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::Block;
                }
                '"' | '\'' | '`' => {
                    out.push(c);
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::Line => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.extend(std::iter::repeat(' ').take(c.len_utf8()));
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.extend(std::iter::repeat(' ').take(c.len_utf8()));
                }
            }
            State::Str(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(n) = chars.next() {
                        out.push(n);
                    }
                } else if c == q || (c == '\n' && q != '`') {
                    state = State::Code;
                }
            }
        }
    }
    out
}
