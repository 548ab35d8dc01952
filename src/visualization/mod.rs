use crate::graph::{ModuleGraph, ModuleId};
use crate::query::{CycleDetectionQuery, EntropyQuery, EntropyWeighting, Query};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotTheme {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankDir {
    LR,
    TB,
}

#[derive(Debug, Clone, Copy)]
pub struct DotOptions {
    /// Group nodes into one cluster per directory.
    pub clusters: bool,
    pub legend: bool,
    pub theme: DotTheme,
    pub rankdir: RankDir,
    pub weighting: EntropyWeighting,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self { clusters: true, legend: true, theme: DotTheme::Light, rankdir: RankDir::LR, weighting: EntropyWeighting::default() }
    }
}

#[derive(Debug, Default)]
pub struct DotGenerator;

impl DotGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }

    #[must_use]
    pub fn generate_dot(&self, graph: &ModuleGraph) -> String {
        self.generate_dot_with_options(graph, DotOptions::default())
    }

    /// Emit a Graphviz digraph: node fill encodes entropy, cycle members and
    /// the edges between them are drawn red, nodes with errors get a dashed border.
    #[must_use]
    pub fn generate_dot_with_options(&self, graph: &ModuleGraph, opts: DotOptions) -> String {
        let entropy = EntropyQuery::new(opts.weighting).run(graph);
        let max_entropy = entropy.per_node.values().copied().fold(0.0_f64, f64::max);
        // cycle index per member, edges inside one component are cycle edges
        let cycle_of: HashMap<ModuleId, usize> = CycleDetectionQuery::new()
            .run(graph)
            .into_iter()
            .enumerate()
            .flat_map(|(i, c)| c.into_iter().map(move |id| (id, i)))
            .collect();

        let mut s = String::new();
        s.push_str("digraph DepTree\n{\n");
        let rank = match opts.rankdir {
            RankDir::LR => "LR",
            RankDir::TB => "TB",
        };
        let _ = write!(
            s,
            "  rankdir={rank};\n  graph [fontname=Helvetica];\n  node [shape=box, fontsize=10, style=\"filled,rounded\"];\n  edge [fontname=Helvetica, fontsize=9];\n"
        );

        let write_node = |out: &mut String, id: &ModuleId, indent: &str| {
            let name = graph.display_name(id);
            let h = entropy.per_node.get(id).copied().unwrap_or(0.0);
            let fill = fill_for_entropy(h, max_entropy, opts.theme);
            let color = if cycle_of.contains_key(id) { "#d62728" } else { border_for_theme(opts.theme) };
            let dashed = graph.node(id).is_some_and(|n| !n.errors.is_empty());
            let style = if dashed { "filled,rounded,dashed" } else { "filled,rounded" };
            let _ = writeln!(
                out,
                "{indent}\"{}\" [label=\"{}\", fillcolor=\"{fill}\", color=\"{color}\", style=\"{style}\", tooltip=\"entropy {h:.2}\"];",
                sanitize_id(&name),
                escape_label(&name)
            );
        };

        if opts.clusters {
            let mut by_dir: BTreeMap<String, Vec<&ModuleId>> = BTreeMap::new();
            for node in graph.nodes() {
                let name = graph.display_name(&node.id);
                let dir = name.rsplit_once('/').map_or_else(String::new, |(d, _)| d.to_string());
                by_dir.entry(dir).or_default().push(&node.id);
            }
            for (dir, ids) in &by_dir {
                if dir.is_empty() {
                    for id in ids {
                        write_node(&mut s, id, "  ");
                    }
                    continue;
                }
                let _ = write!(
                    s,
                    "  subgraph \"cluster_{}\" {{\n    label=\"{}\";\n    color=lightgrey;\n",
                    sanitize_id(dir),
                    escape_label(dir)
                );
                for id in ids {
                    write_node(&mut s, id, "    ");
                }
                s.push_str("  }\n");
            }
        } else {
            for node in graph.nodes() {
                write_node(&mut s, &node.id, "  ");
            }
        }

        for edge in graph.edges() {
            let from = sanitize_id(&graph.display_name(&edge.from));
            let to = sanitize_id(&graph.display_name(&edge.to));
            let in_cycle = matches!((cycle_of.get(&edge.from), cycle_of.get(&edge.to)), (Some(a), Some(b)) if a == b);
            let color = if in_cycle { "#d62728" } else { "#1f77b4" };
            let label = if edge.is_wildcard {
                "*".to_string()
            } else if edge.imported_symbols.is_empty() {
                String::new()
            } else {
                edge.imported_symbols.len().to_string()
            };
            #[allow(clippy::cast_precision_loss)]
            let penwidth = (edge.weight() as f64).sqrt().clamp(0.8, 3.0);
            let _ = writeln!(s, "  \"{from}\" -> \"{to}\" [label=\"{label}\", color=\"{color}\", penwidth={penwidth:.2}];");
        }

        if opts.legend {
            s.push_str("  subgraph cluster_legend {\n    label=\"Legend\";\n    color=grey;\n");
            let low = fill_for_entropy(0.0, 1.0, opts.theme);
            let high = fill_for_entropy(1.0, 1.0, opts.theme);
            let _ = writeln!(s, "    \"legend_low\" [label=\"low entropy\", fillcolor=\"{low}\"];");
            let _ = writeln!(s, "    \"legend_high\" [label=\"high entropy\", fillcolor=\"{high}\"];");
            let _ = writeln!(s, "    \"legend_cycle\" [label=\"in a cycle\", fillcolor=\"{low}\", color=\"#d62728\"];");
            s.push_str("  }\n");
        }

        s.push_str("}\n");
        s
    }
}

fn sanitize_id(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn escape_label(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn border_for_theme(theme: DotTheme) -> &'static str {
    match theme {
        DotTheme::Light => "#7f7f7f",
        DotTheme::Dark => "#d0d0d0",
    }
}

/// Interpolate from a cool to a warm fill as entropy approaches the graph maximum.
fn fill_for_entropy(h: f64, max: f64, theme: DotTheme) -> String {
    let t = if max > 0.0 { (h / max).clamp(0.0, 1.0) } else { 0.0 };
    let (from, to): ([f64; 3], [f64; 3]) = match theme {
        DotTheme::Light => ([224.0, 243.0, 255.0], [255.0, 208.0, 160.0]),
        DotTheme::Dark => ([18.0, 69.0, 89.0], [122.0, 76.0, 0.0]),
    };
    let mut out = String::from("#");
    for i in 0..3 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let c = (from[i] + (to[i] - from[i]) * t).round() as u8;
        let _ = write!(out, "{c:02x}");
    }
    out
}
