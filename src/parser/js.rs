use super::{blank_comments, line_number_for, ImportRecord, ImportedName, Language};
use crate::errors::ExtractionError;
use regex::Regex;

#[derive(Debug)]
struct JsPatterns {
    static_import: Regex,
    side_effect: Regex,
    re_export: Regex,
    require_call: Regex,
    dynamic_import: Regex,
}

impl JsPatterns {
    fn compile() -> Self {
        let static_import = Regex::new(
            r#"(?m)^[ \t]*import\s+(?:type\s+)?(?P<clause>[^'";]*?)\s*from\s*['"](?P<spec>[^'"]+)['"]"#,
        )
        .unwrap();
        let side_effect = Regex::new(r#"(?m)^[ \t]*import\s*['"](?P<spec>[^'"]+)['"]"#).unwrap();
        let re_export = Regex::new(
            r#"(?m)^[ \t]*export\s+(?:type\s+)?(?P<clause>\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"](?P<spec>[^'"]+)['"]"#,
        )
        .unwrap();
        let require_call = Regex::new(r#"\brequire\s*\(\s*['"](?P<spec>[^'"]+)['"]\s*\)"#).unwrap();
        let dynamic_import = Regex::new(r#"\bimport\s*\(\s*['"](?P<spec>[^'"]+)['"]\s*\)"#).unwrap();
        Self { static_import, side_effect, re_export, require_call, dynamic_import }
    }
}

/// JavaScript / TypeScript module syntax: ES imports, `export … from`,
/// CommonJS `require` and dynamic `import()` with literal specifiers.
#[derive(Debug)]
pub struct JsLanguage {
    patterns: JsPatterns,
}

impl JsLanguage {
    #[must_use]
    pub fn new() -> Self {
        Self { patterns: JsPatterns::compile() }
    }
}

impl Default for JsLanguage {
    fn default() -> Self {
        Self::new()
    }
}

impl Language for JsLanguage {
    fn name(&self) -> &'static str {
        "js"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
    }

    fn index_files(&self) -> &'static [&'static str] {
        &["index"]
    }

    fn extract(&self, content: &str) -> Result<Vec<ImportRecord>, ExtractionError> {
        let code = blank_comments(content);
        let mut found: Vec<(usize, ImportRecord)> = Vec::new();

        for cap in self.patterns.static_import.captures_iter(&code) {
            let (Some(all), Some(spec)) = (cap.get(0), cap.name("spec")) else { continue };
            let line = line_number_for(&code, all.start());
            let clause = cap.name("clause").map_or("", |m| m.as_str());
            let mut record = specifier_record(spec.as_str()).at_line(line);
            apply_clause(&mut record, clause, line)?;
            found.push((all.start(), record));
        }
        for cap in self.patterns.re_export.captures_iter(&code) {
            let (Some(all), Some(spec)) = (cap.get(0), cap.name("spec")) else { continue };
            let line = line_number_for(&code, all.start());
            let clause = cap.name("clause").map_or("", |m| m.as_str());
            let mut record = specifier_record(spec.as_str()).at_line(line);
            apply_clause(&mut record, clause, line)?;
            record.is_re_export = true;
            found.push((all.start(), record));
        }
        for re in [&self.patterns.side_effect, &self.patterns.require_call, &self.patterns.dynamic_import] {
            for cap in re.captures_iter(&code) {
                let (Some(all), Some(spec)) = (cap.get(0), cap.name("spec")) else { continue };
                found.push((all.start(), specifier_record(spec.as_str()).at_line(line_number_for(&code, all.start()))));
            }
        }

        // a static import that never found its `from` leaves a dangling brace behind
        for (idx, _) in code.match_indices("import {") {
            if !code[idx..].contains('}') {
                return Err(ExtractionError::Unterminated { line: line_number_for(&code, idx) });
            }
        }

        found.sort_by_key(|(offset, _)| *offset);
        Ok(found.into_iter().map(|(_, r)| r).collect())
    }
}

/// Split a module specifier into relative depth and path segments.
///
/// `./a` is depth 1, each leading `../` adds one more, bare specifiers are depth 0.
fn specifier_record(spec: &str) -> ImportRecord {
    let mut depth = 0usize;
    let mut rest = spec.trim();
    if rest == "." {
        return ImportRecord::new(Vec::<String>::new()).relative(1);
    }
    if let Some(r) = rest.strip_prefix("./") {
        depth = 1;
        rest = r;
    }
    loop {
        if let Some(r) = rest.strip_prefix("../") {
            depth = depth.max(1) + 1;
            rest = r;
        } else if rest == ".." {
            depth = depth.max(1) + 1;
            rest = "";
        } else {
            break;
        }
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    ImportRecord::new(segments).relative(depth)
}

fn apply_clause(record: &mut ImportRecord, clause: &str, line: usize) -> Result<(), ExtractionError> {
    let mut rest = clause.trim();
    if rest.is_empty() {
        return Ok(());
    }
    if !rest.starts_with('{') && !rest.starts_with('*') {
        let (default, tail) = rest.split_once(',').unwrap_or((rest, ""));
        let default = default.trim();
        if !is_js_identifier(default) {
            return Err(ExtractionError::Invalid { line, detail: format!("bad default import \"{default}\"") });
        }
        record.imported_names.insert(ImportedName::new("default").with_alias(default));
        rest = tail.trim();
    }
    if let Some(star) = rest.strip_prefix('*') {
        record.is_wildcard = true;
        let star = star.trim();
        if let Some(ns) = star.strip_prefix("as") {
            let ns = ns.trim();
            if !is_js_identifier(ns) {
                return Err(ExtractionError::Invalid { line, detail: format!("bad namespace \"{ns}\"") });
            }
            record.alias = Some(ns.to_string());
        }
        return Ok(());
    }
    if let Some(list) = rest.strip_prefix('{') {
        let Some(inner) = list.trim_end().strip_suffix('}') else {
            return Err(ExtractionError::Unterminated { line });
        };
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let part = part.strip_prefix("type ").map_or(part, str::trim);
            let words: Vec<&str> = part.split_whitespace().collect();
            let name = match words.as_slice() {
                [n] => ImportedName::new(*n),
                [n, "as", a] => ImportedName::new(*n).with_alias(*a),
                _ => {
                    return Err(ExtractionError::Invalid { line, detail: format!("bad import specifier \"{part}\"") })
                }
            };
            record.imported_names.insert(name);
        }
        return Ok(());
    }
    if rest.is_empty() {
        Ok(())
    } else {
        Err(ExtractionError::Invalid { line, detail: format!("unexpected import clause \"{rest}\"") })
    }
}

fn is_js_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
}
