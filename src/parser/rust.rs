use super::{blank_comments, line_number_for, ImportRecord, ImportedName, Language};
use crate::errors::ExtractionError;
use regex::Regex;
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct RustPatterns {
    mod_decl: Regex,
    use_stmt: Regex,
}

impl RustPatterns {
    fn compile() -> Self {
        let mod_decl =
            Regex::new(r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?\s+)?mod\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*;").unwrap();
        let use_stmt =
            Regex::new(r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?\s+)?use\s+(?P<tree>[^;]+);").unwrap();
        Self { mod_decl, use_stmt }
    }
}

/// Rust modules: `mod x;` declarations and `use` trees rooted at `crate`,
/// `self` or `super`. Paths starting anywhere else name other crates.
///
/// A directory is importable through `mod.rs`, or `lib.rs`/`main.rs` for the
/// crate root, so `super` out of a top-level module lands on the crate root.
#[derive(Debug)]
pub struct RustLanguage {
    patterns: RustPatterns,
}

impl RustLanguage {
    #[must_use]
    pub fn new() -> Self {
        Self { patterns: RustPatterns::compile() }
    }
}

impl Default for RustLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl Language for RustLanguage {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn index_files(&self) -> &'static [&'static str] {
        &["mod", "lib", "main"]
    }

    fn extract(&self, content: &str) -> Result<Vec<ImportRecord>, ExtractionError> {
        let code = blank_comments(content);
        let mut found: Vec<(usize, ImportRecord)> = Vec::new();

        for cap in self.patterns.mod_decl.captures_iter(&code) {
            let (Some(all), Some(name)) = (cap.get(0), cap.name("name")) else { continue };
            let record = ImportRecord::new([name.as_str()])
                .relative(1)
                .at_line(line_number_for(&code, all.start()));
            found.push((all.start(), record));
        }

        for cap in self.patterns.use_stmt.captures_iter(&code) {
            let (Some(all), Some(tree)) = (cap.get(0), cap.name("tree")) else { continue };
            let line = line_number_for(&code, all.start());
            let is_pub = cap.name("vis").is_some();
            let mut leaves = Vec::new();
            expand_use_tree(tree.as_str(), &[], line, &mut leaves)?;
            for leaf in leaves {
                let mut record = leaf_record(leaf).at_line(line);
                record.is_re_export = is_pub;
                found.push((all.start(), record));
            }
        }

        // `use a::{b` without a closing `;` never matches the statement pattern
        if let Some(idx) = code.find("use ").filter(|&i| {
            let tail = &code[i..];
            tail.contains('{') && !tail.contains(';') && is_statement_start(&code, i)
        }) {
            return Err(ExtractionError::Unterminated { line: line_number_for(&code, idx) });
        }

        found.sort_by_key(|(offset, _)| *offset);
        Ok(found.into_iter().map(|(_, r)| r).collect())
    }

    fn module_dir(&self, file: &Path) -> PathBuf {
        let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
        match file.file_stem().and_then(|s| s.to_str()) {
            Some("mod" | "lib" | "main") | None => parent,
            Some(stem) => parent.join(stem),
        }
    }

    fn source_root(&self, project_root: &Path) -> PathBuf {
        let src = project_root.join("src");
        if src.is_dir() {
            src
        } else {
            project_root.to_path_buf()
        }
    }

    fn rooted_segments<'r>(&self, record: &'r ImportRecord) -> Option<&'r [String]> {
        match record.path.split_first() {
            Some((first, rest)) if first == "crate" => Some(rest),
            _ => None,
        }
    }

    fn is_external(&self, record: &ImportRecord) -> bool {
        record.relative_depth == 0 && record.path.first().map_or(true, |s| s != "crate")
    }

    fn allows_partial_paths(&self) -> bool {
        true
    }
}

fn is_statement_start(code: &str, idx: usize) -> bool {
    code[..idx].chars().rev().take_while(|c| *c != '\n').all(|c| c == ' ' || c == '\t')
}

#[derive(Debug, PartialEq)]
enum UseLeaf {
    /// `a::b::Item [as x]`
    Item { path: Vec<String>, alias: Option<String> },
    /// `a::b::*`
    Glob { path: Vec<String> },
    /// `a::b::{self [as x]}`
    Module { path: Vec<String>, alias: Option<String> },
}

fn expand_use_tree(
    tree: &str,
    prefix: &[String],
    line: usize,
    out: &mut Vec<UseLeaf>,
) -> Result<(), ExtractionError> {
    let tree = tree.trim();
    if tree.is_empty() {
        return Ok(());
    }
    if let Some(open) = tree.find('{') {
        let Some(inner) = tree[open + 1..].trim_end().strip_suffix('}') else {
            return Err(ExtractionError::Unterminated { line });
        };
        let head = tree[..open].trim().trim_end_matches("::");
        let mut scope = prefix.to_vec();
        scope.extend(path_segments(head));
        for part in split_top_level(inner) {
            expand_use_tree(part, &scope, line, out)?;
        }
        return Ok(());
    }
    let (path, alias) = match tree.split_once(" as ") {
        Some((p, a)) => (p.trim(), Some(a.trim().to_string())),
        None => (tree, None),
    };
    let mut full = prefix.to_vec();
    full.extend(path_segments(path));
    if full.iter().any(|s| !is_path_segment(s)) {
        return Err(ExtractionError::Invalid { line, detail: format!("bad use path \"{tree}\"") });
    }
    match full.last().map(String::as_str) {
        Some("*") => {
            full.pop();
            out.push(UseLeaf::Glob { path: full });
        }
        Some("self") if full.len() > 1 => {
            full.pop();
            out.push(UseLeaf::Module { path: full, alias });
        }
        Some(_) => out.push(UseLeaf::Item { path: full, alias }),
        None => {}
    }
    Ok(())
}

fn path_segments(s: &str) -> Vec<String> {
    s.split("::").map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

fn is_path_segment(s: &str) -> bool {
    s == "*"
        || (s.chars().next().is_some_and(|c| c == '_' || c.is_alphabetic())
            && s.chars().all(|c| c == '_' || c.is_alphanumeric()))
}

// split on commas that are not nested inside braces
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Turn an expanded use path into a record: `self::` is depth 1, each
/// `super::` adds one, `crate::` stays as the first absolute segment.
fn leaf_record(leaf: UseLeaf) -> ImportRecord {
    let (segments, name, alias, wildcard) = match leaf {
        UseLeaf::Item { path, alias } => {
            let name = path.last().cloned();
            (path, name, alias, false)
        }
        UseLeaf::Glob { path } => (path, None, None, true),
        UseLeaf::Module { path, alias } => (path, None, alias, false),
    };
    let mut depth = 0;
    let mut rest = segments.as_slice();
    if rest.first().is_some_and(|s| s == "self") {
        depth = 1;
        rest = &rest[1..];
    }
    while rest.first().is_some_and(|s| s == "super") {
        depth = depth.max(1) + 1;
        rest = &rest[1..];
    }
    let mut record = ImportRecord::new(rest.iter().cloned()).relative(depth);
    match name {
        Some(n) => {
            let imported = match alias {
                Some(a) => ImportedName::new(n).with_alias(a),
                None => ImportedName::new(n),
            };
            record.imported_names.insert(imported);
        }
        None => record.alias = alias,
    }
    record.is_wildcard = wildcard;
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(src: &str) -> Vec<ImportRecord> {
        RustLanguage::new().extract(src).expect("extract")
    }

    #[test]
    fn mod_declarations_are_same_directory_imports() {
        let recs = extract("pub mod graph;\nmod utils;\nmod inline { }\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].specifier(), "./graph");
        assert_eq!(recs[1].specifier(), "./utils");
    }

    #[test]
    fn use_trees_expand_into_one_record_per_leaf() {
        let recs = extract("use crate::graph::{ModuleGraph, resolver::Resolver as R, builder::*};\n");
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].path, vec!["crate", "graph", "ModuleGraph"]);
        assert_eq!(recs[1].path, vec!["crate", "graph", "resolver", "Resolver"]);
        let first = recs[1].imported_names.iter().next().unwrap();
        assert_eq!(first.local_name(), "R");
        assert!(recs[2].is_wildcard);
        assert_eq!(recs[2].path, vec!["crate", "graph", "builder"]);
    }

    #[test]
    fn self_and_super_become_relative_depths() {
        let recs = extract("use self::a::B;\nuse super::super::c::D;\nuse super::{self as parent};\n");
        assert_eq!((recs[0].relative_depth, recs[0].path.clone()), (1, vec!["a".into(), "B".into()]));
        assert_eq!(recs[1].relative_depth, 3);
        assert_eq!(recs[1].path, vec!["c", "D"]);
        assert_eq!(recs[2].relative_depth, 2);
        assert!(recs[2].path.is_empty());
        assert_eq!(recs[2].alias.as_deref(), Some("parent"));
    }

    #[test]
    fn pub_use_is_a_re_export() {
        let recs = extract("pub use crate::errors::DepTreeError;\nuse std::fmt;\n");
        assert!(recs[0].is_re_export);
        assert!(!recs[1].is_re_export);
    }

    #[test]
    fn external_crates_are_detected() {
        let lang = RustLanguage::new();
        let recs = extract("use serde::Serialize;\nuse crate::a::B;\n");
        assert!(lang.is_external(&recs[0]));
        assert!(!lang.is_external(&recs[1]));
        assert!(lang.rooted_segments(&recs[0]).is_none());
        assert_eq!(lang.rooted_segments(&recs[1]).unwrap(), &["a".to_string(), "B".to_string()]);
    }

    #[test]
    fn module_dir_depends_on_file_stem() {
        let lang = RustLanguage::new();
        assert_eq!(lang.module_dir(Path::new("/p/src/lib.rs")), PathBuf::from("/p/src"));
        assert_eq!(lang.module_dir(Path::new("/p/src/a/mod.rs")), PathBuf::from("/p/src/a"));
        assert_eq!(lang.module_dir(Path::new("/p/src/a.rs")), PathBuf::from("/p/src/a"));
    }

    #[test]
    fn commented_out_uses_are_ignored() {
        let recs = extract("// use crate::gone;\n/* mod hidden; */\nuse crate::kept;\n");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].line, 3);
    }

    #[test]
    fn unbalanced_use_groups_are_errors() {
        assert!(RustLanguage::new().extract("use crate::{a, b;\n").is_err());
    }
}
