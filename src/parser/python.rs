use super::{ImportRecord, ImportedName, Language};
use crate::errors::ExtractionError;
use regex::Regex;
use std::path::Path;

#[derive(Debug)]
struct PythonPatterns {
    import_stmt: Regex,
    from_stmt: Regex,
}

impl PythonPatterns {
    fn compile() -> Self {
        let import_stmt = Regex::new(r"^(?P<indent>[ \t]*)import\s+(?P<body>.+?)\s*$").unwrap();
        let from_stmt = Regex::new(
            r"^(?P<indent>[ \t]*)from(?P<dots>\s*\.[\s.]*|\s+)(?P<path>[A-Za-z_]\w*(?:\s*\.\s*[A-Za-z_]\w*)*)?\s*import\s*(?P<names>.+?)\s*$",
        )
        .unwrap();
        Self { import_stmt, from_stmt }
    }
}

/// Python `import` / `from … import` extraction.
///
/// Statements nested under `if`/`try`/function bodies (any indentation) are
/// flagged as conditional and dropped entirely when `exclude_conditional_imports`
/// is set.
#[derive(Debug)]
pub struct PythonLanguage {
    exclude_conditional_imports: bool,
    patterns: PythonPatterns,
}

impl PythonLanguage {
    #[must_use]
    pub fn new(exclude_conditional_imports: bool) -> Self {
        Self { exclude_conditional_imports, patterns: PythonPatterns::compile() }
    }

    fn parse_statement(&self, line: usize, stmt: &str) -> Result<Vec<ImportRecord>, ExtractionError> {
        if let Some(cap) = self.patterns.from_stmt.captures(stmt) {
            let indented = cap.name("indent").is_some_and(|m| !m.as_str().is_empty());
            let depth = cap.name("dots").map_or(0, |m| m.as_str().matches('.').count());
            let path = cap.name("path").map_or_else(Vec::new, |m| dotted_segments(m.as_str()));
            if depth == 0 && path.is_empty() {
                return Err(ExtractionError::Invalid { line, detail: "missing module path".into() });
            }
            let names_src = cap.name("names").map_or("", |m| m.as_str()).trim();
            let inner = names_src
                .strip_prefix('(')
                .map(|s| s.strip_suffix(')').unwrap_or(s))
                .unwrap_or(names_src)
                .trim();
            let mut record = ImportRecord::new(path).relative(depth).at_line(line);
            record.is_conditional = indented;
            if inner == "*" {
                record.is_wildcard = true;
            } else {
                for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    record.imported_names.insert(parse_name(line, part)?);
                }
                if record.imported_names.is_empty() {
                    return Err(ExtractionError::Invalid { line, detail: "no imported names".into() });
                }
            }
            return Ok(vec![record]);
        }

        if let Some(cap) = self.patterns.import_stmt.captures(stmt) {
            let indented = cap.name("indent").is_some_and(|m| !m.as_str().is_empty());
            let body = cap.name("body").map_or("", |m| m.as_str());
            let mut out = Vec::new();
            for part in body.split(',').map(str::trim) {
                let (module, alias) = match part.split_once(" as ") {
                    Some((m, a)) => (m.trim(), Some(a.trim().to_string())),
                    None => (part, None),
                };
                let path = dotted_segments(module);
                if path.is_empty() || path.iter().any(|s| !is_identifier(s)) {
                    return Err(ExtractionError::Invalid { line, detail: format!("bad module \"{part}\"") });
                }
                let mut record = ImportRecord::new(path).at_line(line);
                record.alias = alias;
                record.is_conditional = indented;
                out.push(record);
            }
            return Ok(out);
        }

        Ok(Vec::new())
    }
}

impl Default for PythonLanguage {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Language for PythonLanguage {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn index_files(&self) -> &'static [&'static str] {
        &["__init__"]
    }

    fn extract(&self, content: &str) -> Result<Vec<ImportRecord>, ExtractionError> {
        let mut out = Vec::new();
        for (line, stmt) in logical_statements(content)? {
            for record in self.parse_statement(line, &stmt)? {
                if self.exclude_conditional_imports && record.is_conditional {
                    continue;
                }
                out.push(record);
            }
        }
        Ok(out)
    }

    fn handles(&self, path: &Path) -> bool {
        matches!(path.extension().and_then(|e| e.to_str()), Some("py" | "pyi"))
    }
}

fn dotted_segments(s: &str) -> Vec<String> {
    s.split('.').map(str::trim).filter(|p| !p.is_empty()).map(str::to_string).collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

fn parse_name(line: usize, part: &str) -> Result<ImportedName, ExtractionError> {
    let words: Vec<&str> = part.split_whitespace().collect();
    match words.as_slice() {
        [name] if is_identifier(name) => Ok(ImportedName::new(*name)),
        [name, "as", alias] if is_identifier(name) && is_identifier(alias) => {
            Ok(ImportedName::new(*name).with_alias(*alias))
        }
        _ => Err(ExtractionError::Invalid { line, detail: format!("bad imported name \"{part}\"") }),
    }
}

// Strip a trailing `#` comment, ignoring `#` inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

/// Join physical lines into import statements: parenthesised name lists and
/// backslash continuations span lines; triple-quoted strings are skipped.
fn logical_statements(content: &str) -> Result<Vec<(usize, String)>, ExtractionError> {
    let mut out = Vec::new();
    let mut in_string: Option<&'static str> = None;
    let mut pending: Option<(usize, String, bool)> = None; // (start line, text, waiting for ')')

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(delim) = in_string {
            // code after a closing delimiter is never an import statement
            if raw.contains(delim) {
                in_string = None;
            }
            continue;
        }
        let mut line = strip_comment(raw).to_string();
        for delim in ["\"\"\"", "'''"] {
            if line.matches(delim).count() % 2 == 1 {
                if let Some(pos) = line.find(delim) {
                    line.truncate(pos);
                }
                in_string = Some(delim);
                break;
            }
        }

        if let Some((start, mut text, paren)) = pending.take() {
            let body = line.trim();
            let (body, continues) = match body.strip_suffix('\\') {
                Some(b) => (b.trim_end(), true),
                None => (body, false),
            };
            text.push(' ');
            text.push_str(body);
            let still_open = paren && !body.contains(')');
            if still_open || continues {
                pending = Some((start, text, still_open));
            } else {
                out.push((start, text));
            }
            continue;
        }

        let trimmed = line.trim_start();
        if !(trimmed.starts_with("import") || trimmed.starts_with("from")) {
            continue;
        }
        let body = line.trim_end();
        let (body, continues) = match body.strip_suffix('\\') {
            Some(b) => (b.trim_end(), true),
            None => (body, false),
        };
        let open = body.contains('(') && !body.contains(')');
        if open || continues {
            pending = Some((line_no, body.to_string(), open));
        } else {
            out.push((line_no, body.to_string()));
        }
    }

    match pending {
        Some((start, _, true)) => Err(ExtractionError::Unterminated { line: start }),
        Some((start, text, false)) => {
            out.push((start, text));
            Ok(out)
        }
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(src: &str) -> Vec<ImportRecord> {
        PythonLanguage::new(false).extract(src).expect("extract")
    }

    fn names(r: &ImportRecord) -> Vec<(String, Option<String>)> {
        r.imported_names.iter().map(|n| (n.name.clone(), n.alias.clone())).collect()
    }

    #[test]
    fn plain_and_aliased_imports() {
        let recs = extract("import foo\nimport foo.bar as alias\nimport foo   . bar\n");
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].path, vec!["foo"]);
        assert_eq!(recs[1].path, vec!["foo", "bar"]);
        assert_eq!(recs[1].alias.as_deref(), Some("alias"));
        assert_eq!(recs[2].path, vec!["foo", "bar"]);
        assert!(recs.iter().all(|r| r.relative_depth == 0 && !r.is_conditional));
    }

    #[test]
    fn indented_imports_are_conditional() {
        let recs = extract("if x:\n    import foo\ntry:\n  from foo import a\nexcept ImportError:\n  pass\n");
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.is_conditional));
        let filtered = PythonLanguage::new(true).extract("import a\nif x:\n    import b\n").unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].path, vec!["a"]);
    }

    #[test]
    fn from_imports_with_parentheses_and_aliases() {
        let recs = extract("from foo.bar import (\n    a,\n    b as b_2,\n)\n");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].path, vec!["foo", "bar"]);
        assert_eq!(
            names(&recs[0]),
            vec![("a".to_string(), None), ("b".to_string(), Some("b_2".to_string()))]
        );
        assert_eq!(recs[0].line, 1);
    }

    #[test]
    fn relative_from_imports() {
        let recs = extract("from .foo import a\nfrom.foo import a\nfrom . import a\nfrom ... import a\n");
        assert_eq!(recs[0].relative_depth, 1);
        assert_eq!(recs[0].path, vec!["foo"]);
        assert_eq!(recs[1].relative_depth, 1);
        assert_eq!(recs[1].path, vec!["foo"]);
        assert_eq!(recs[2].relative_depth, 1);
        assert!(recs[2].path.is_empty());
        assert_eq!(recs[3].relative_depth, 3);
        assert!(recs[3].path.is_empty());
    }

    #[test]
    fn wildcard_from_import() {
        let recs = extract("from foo import *\n");
        assert!(recs[0].is_wildcard);
        assert!(recs[0].imported_names.is_empty());
    }

    #[test]
    fn comments_and_docstrings_are_ignored() {
        let src = "\"\"\"\nimport not_real\n\"\"\"\n# import commented\nimport real  # trailing\n";
        let recs = extract(src);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].path, vec!["real"]);
        assert_eq!(recs[0].line, 5);
    }

    #[test]
    fn unterminated_parenthesis_is_an_error() {
        let err = PythonLanguage::new(false).extract("from foo import (a,\n b\n").unwrap_err();
        assert_eq!(err, ExtractionError::Unterminated { line: 1 });
    }

    #[test]
    fn malformed_names_are_errors() {
        assert!(PythonLanguage::new(false).extract("from foo import a b c\n").is_err());
    }
}
