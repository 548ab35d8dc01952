use crate::check::{CheckQuery, CheckReport};
use crate::cli::{Cli, Commands, DotRankDirArg, DotThemeArg, GlobalArgs, GraphSource, OnOffArg, OutputFormat, WeightingArg};
use crate::errors::DepTreeError;
use crate::graph::builder::GraphBuilder;
use crate::graph::resolver::ModuleSystemConfig;
use crate::graph::{ModuleGraph, ModuleId};
use crate::logger::init_logger;
use crate::parser::infer_language;
use crate::query::{CycleDetectionQuery, EntropyQuery, EntropyWeighting, Query};
use crate::tui::{self, ExploreOptions, ViewMode};
use crate::utils::config::{self, Config, CONFIG_FILE_NAME};
use crate::utils::{file_walker, project_root, table};
use crate::visualization::{DotGenerator, DotOptions, DotTheme, RankDir};
use clap::CommandFactory;
use clap_complete::generate;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Run the CLI logic in-process.
///
/// Returns an exit code: 0 on success, 1 on a fatal error or when `check`
/// finds violations. Usage errors (2) are reported by clap before this runs.
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    init_logger(cli.global.verbose, cli.global.quiet, cli.global.no_color);
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

/// Resolved project settings for one run.
struct Session {
    root: PathBuf,
    config: Config,
    module_system: ModuleSystemConfig,
}

impl Session {
    fn open(global: &GlobalArgs, first_entry: Option<&Path>) -> Result<Self, DepTreeError> {
        let cwd = std::env::current_dir()?;
        let root = match (&global.root, first_entry) {
            (Some(r), _) => path_clean::clean(cwd.join(r)),
            (None, Some(entry)) => project_root::detect(&cwd.join(entry)),
            (None, None) => project_root::detect(&cwd),
        };
        let mut config = match &global.config {
            Some(p) => config::load_config_at(&cwd.join(p))?,
            None => config::load_config_near(&root)?.unwrap_or_default(),
        };

        // flags override the file
        config.unwrap_exports |= global.unwrap_exports;
        config.python.exclude_conditional_imports |= global.python_exclude_conditional_imports;
        if let Some(v) = global.js_tsconfig_paths {
            config.js.tsconfig_paths = v;
        }
        if let Some(v) = global.js_workspaces {
            config.js.workspaces = v;
        }
        for pattern in &global.exclude {
            let p = Path::new(pattern);
            let abs = if p.is_absolute() || pattern.starts_with("**") { pattern.clone() } else { cwd.join(p).to_string_lossy().into_owned() };
            config.exclude.push(abs);
        }

        let module_system = config.module_system(&root);
        // fail on malformed globs before any parsing starts
        module_system.exclude_matcher()?;
        tracing::debug!(root = %root.display(), "session opened");
        Ok(Self { root, config, module_system })
    }

    fn build(&self, files: &[PathBuf], global: &GlobalArgs) -> Result<ModuleGraph, DepTreeError> {
        let entries = file_walker::expand_entries(files, &self.module_system, global.no_ignore)?;
        let language = infer_language(&entries, &self.module_system)?;
        let mut builder = GraphBuilder::new(language, &self.module_system)?;
        if let Some(n) = global.workers {
            builder = builder.workers(n);
        }
        builder.build(&entries)
    }

    fn graph(&self, source: &GraphSource, global: &GlobalArgs) -> Result<ModuleGraph, DepTreeError> {
        match &source.graph {
            Some(p) => ModuleGraph::load_json(p),
            None => self.build(&source.files, global),
        }
    }

    fn weighting(&self, arg: Option<WeightingArg>) -> EntropyWeighting {
        match arg {
            Some(WeightingArg::Symbols) => EntropyWeighting::Symbols,
            Some(WeightingArg::Edges) => EntropyWeighting::Edges,
            None => self.config.entropy.weighting,
        }
    }
}

fn first_file(source: &GraphSource) -> Option<&Path> {
    source.files.first().map(PathBuf::as_path)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), DepTreeError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct EntropyRow {
    file: String,
    entropy: f64,
    dependencies: usize,
    dependents: usize,
}

#[derive(Serialize)]
struct ErrorRow {
    file: String,
    kind: crate::errors::NodeErrorKind,
    message: String,
}

#[derive(Serialize)]
struct EntropyOutput {
    graph_entropy: f64,
    files: usize,
    edges: usize,
    cycles: usize,
    top: Vec<EntropyRow>,
    errors: Vec<ErrorRow>,
}

fn error_rows(graph: &ModuleGraph) -> Vec<ErrorRow> {
    graph
        .errors()
        .flat_map(|(id, errs)| {
            errs.iter().map(|e| ErrorRow { file: graph.display_name(id), kind: e.kind, message: e.message.clone() })
        })
        .collect()
}

fn entropy_report(graph: &ModuleGraph, weighting: EntropyWeighting, top: usize, format: OutputFormat) -> Result<(), DepTreeError> {
    let report = EntropyQuery::new(weighting).run(graph);
    let cycles = CycleDetectionQuery::new().run(graph);
    let mut rows: Vec<EntropyRow> = report
        .per_node
        .iter()
        .map(|(id, h)| EntropyRow {
            file: graph.display_name(id),
            entropy: *h,
            dependencies: graph.dependencies(id).len(),
            dependents: graph.dependents(id).len(),
        })
        .collect();
    rows.sort_by(|a, b| b.entropy.total_cmp(&a.entropy).then_with(|| a.file.cmp(&b.file)));
    rows.truncate(top);
    let out = EntropyOutput {
        graph_entropy: report.graph,
        files: graph.node_count(),
        edges: graph.edges().len(),
        cycles: cycles.len(),
        top: rows,
        errors: error_rows(graph),
    };
    if format == OutputFormat::Json {
        return print_json(&out);
    }
    let body: Vec<Vec<String>> = out
        .top
        .iter()
        .map(|r| vec![r.file.clone(), format!("{:.3}", r.entropy), r.dependencies.to_string(), r.dependents.to_string()])
        .collect();
    println!("{}", table::render(&["File", "Entropy", "Deps", "Dependents"], &body));
    println!("graph entropy: {:.3}", out.graph_entropy);
    println!("files: {}  edges: {}  cycles: {}", out.files, out.edges, out.cycles);
    if !out.errors.is_empty() {
        println!("errors: {}", out.errors.len());
        for e in &out.errors {
            println!("  {}: {}", e.file, e.message);
        }
    }
    Ok(())
}

fn cycles_report(graph: &ModuleGraph, format: OutputFormat) -> Result<(), DepTreeError> {
    let cycles: Vec<Vec<String>> = CycleDetectionQuery::new()
        .run(graph)
        .iter()
        .map(|c| c.iter().map(|id| graph.display_name(id)).collect())
        .collect();
    if format == OutputFormat::Json {
        return print_json(&cycles);
    }
    if cycles.is_empty() {
        println!("<no cycles>");
    }
    for (i, c) in cycles.iter().enumerate() {
        println!("cycle {}: {}", i + 1, c.join(", "));
    }
    Ok(())
}

fn check_entries(session: &Session, files: &[PathBuf]) -> Result<Vec<PathBuf>, DepTreeError> {
    if !files.is_empty() {
        return Ok(files.to_vec());
    }
    if session.config.check.entrypoints.is_empty() {
        return Err(DepTreeError::NoEntryFiles(format!(
            "pass entry files or set check.entrypoints in {CONFIG_FILE_NAME}"
        )));
    }
    Ok(session.config.check.entrypoints.iter().map(|e| session.root.join(e)).collect())
}

fn print_check(report: &CheckReport, format: OutputFormat) -> Result<(), DepTreeError> {
    if format == OutputFormat::Json {
        return print_json(report);
    }
    for v in &report.violations {
        println!("{} -> {}: {}", v.from, v.to, v.reason);
    }
    for c in &report.cycles {
        println!("circular dependency: {}", c.join(" -> "));
    }
    if report.is_clean() {
        println!("dep-tree check passed");
    } else {
        println!("dep-tree check failed: {} violation(s), {} cycle(s)", report.violations.len(), report.cycles.len());
    }
    Ok(())
}

fn entry_id(graph: &ModuleGraph, files: &[PathBuf]) -> Option<ModuleId> {
    let cwd = std::env::current_dir().ok()?;
    files
        .iter()
        .map(|f| ModuleId::new(cwd.join(f)))
        .find(|id| graph.contains(id))
        .or_else(|| graph.entries.first().cloned())
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<i32, DepTreeError> {
    let global = cli.global;
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let mut out = io::stdout();
            generate(shell, &mut cmd, "dep-tree", &mut out);
            Ok(0)
        }
        Commands::Config { write } => {
            if !write {
                print!("{}", config::SAMPLE);
                return Ok(0);
            }
            let session = Session::open(&global, None)?;
            let path = session.root.join(CONFIG_FILE_NAME);
            if path.exists() {
                return Err(DepTreeError::Config(format!("{} already exists", path.display())));
            }
            fs::write(&path, config::SAMPLE)?;
            if !global.quiet {
                println!("wrote {}", path.display());
            }
            Ok(0)
        }
        Commands::Entropy { source, weighting, top, format } => {
            let session = Session::open(&global, first_file(&source))?;
            let graph = session.graph(&source, &global)?;
            entropy_report(&graph, session.weighting(weighting), top, format)?;
            Ok(0)
        }
        Commands::Cycles { source, format } => {
            let session = Session::open(&global, first_file(&source))?;
            let graph = session.graph(&source, &global)?;
            cycles_report(&graph, format)?;
            Ok(0)
        }
        Commands::Check { files, format } => {
            let session = Session::open(&global, files.first().map(PathBuf::as_path))?;
            let rules = session.config.rule_set()?;
            let entries = check_entries(&session, &files)?;
            let graph = session.build(&entries, &global)?;
            let query =
                CheckQuery { rules, allow_circular_dependencies: session.config.check.allow_circular_dependencies };
            let report = query.run(&graph);
            print_check(&report, format)?;
            Ok(i32::from(!report.is_clean()))
        }
        Commands::Tree { files, overview, weighting } => {
            let session = Session::open(&global, files.first().map(PathBuf::as_path))?;
            let graph = session.build(&files, &global)?;
            let entry = entry_id(&graph, &files)
                .ok_or_else(|| DepTreeError::NoEntryFiles("no entry file made it into the graph".to_string()))?;
            let view = if overview || session.config.tree.overview { ViewMode::Overview } else { ViewMode::Focus };
            let options = ExploreOptions { view, weighting: session.weighting(weighting) };
            tui::run(&graph, entry, options)?;
            Ok(0)
        }
        Commands::Export { source, json, dot, dot_clusters, dot_legend, dot_theme, dot_rankdir } => {
            let session = Session::open(&global, first_file(&source))?;
            let graph = session.graph(&source, &global)?;
            let opts = DotOptions {
                clusters: dot_clusters == OnOffArg::On,
                legend: dot_legend == OnOffArg::On,
                theme: match dot_theme {
                    DotThemeArg::Light => DotTheme::Light,
                    DotThemeArg::Dark => DotTheme::Dark,
                },
                rankdir: match dot_rankdir {
                    DotRankDirArg::LR => RankDir::LR,
                    DotRankDirArg::TB => RankDir::TB,
                },
                weighting: session.config.entropy.weighting,
            };
            if let Some(path) = &json {
                graph.save_json(path)?;
            }
            match &dot {
                Some(path) => fs::write(path, DotGenerator::new().generate_dot_with_options(&graph, opts))?,
                None if json.is_none() => print!("{}", DotGenerator::new().generate_dot_with_options(&graph, opts)),
                None => {}
            }
            Ok(0)
        }
    }
}
