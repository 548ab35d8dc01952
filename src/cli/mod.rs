use clap::{Args, Parser, Subcommand, ValueEnum};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "dep-tree",
    version,
    about = "Visualize and check your project's dependency graph",
    long_about = "Build the file-level dependency graph of a JavaScript/TypeScript, Python or Rust project from one or more entry files, then report entropy and cycles, check it against your own rules, export it, or explore it interactively. When the first argument is not a command, `entropy` is assumed.",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command; flags override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// Path to the config file (default: .dep-tree.toml in the project root)
    #[arg(short, long, global = true, env = "DEP_TREE_CONFIG")]
    pub config: Option<PathBuf>,
    /// Project root; detected from the first entry file when omitted
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
    /// Trace re-exported symbols to the file where they are declared
    #[arg(long, global = true)]
    pub unwrap_exports: bool,
    /// Files matching this glob are ignored; may be given several times
    #[arg(long = "exclude", global = true, value_name = "GLOB")]
    pub exclude: Vec<String>,
    /// Follow tsconfig.json `paths` while resolving imports
    #[arg(long, global = true, value_name = "BOOL")]
    pub js_tsconfig_paths: Option<bool>,
    /// Resolve package names from the root package.json `workspaces`
    #[arg(long, global = true, value_name = "BOOL")]
    pub js_workspaces: Option<bool>,
    /// Exclude Python imports nested in if/try blocks or function bodies
    #[arg(long, global = true)]
    pub python_exclude_conditional_imports: bool,
    /// Include files matched by .gitignore/.ignore when expanding directories
    #[arg(long, global = true)]
    pub no_ignore: bool,
    /// Number of parser threads (default: available cores)
    #[arg(long, global = true)]
    pub workers: Option<usize>,
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
    /// Disable coloured log output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeightingArg {
    Symbols,
    Edges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnOffArg {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DotThemeArg {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[allow(clippy::upper_case_acronyms)]
pub enum DotRankDirArg {
    LR,
    TB,
}

/// Where the graph comes from: entry files, or a graph saved with `export --json`.
#[derive(Debug, Clone, Args)]
pub struct GraphSource {
    /// Entry files or directories
    #[arg(required_unless_present = "graph")]
    pub files: Vec<PathBuf>,
    /// Import a graph written by `export --json` instead of parsing sources; it is used as saved, never refreshed
    #[arg(long, conflicts_with = "files")]
    pub graph: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report per-file and whole-graph entropy, plus cycle and error counts
    Entropy {
        #[command(flatten)]
        source: GraphSource,
        /// How edges are weighted (default from config, else symbols)
        #[arg(long, value_enum)]
        weighting: Option<WeightingArg>,
        /// Show only the N files with the highest entropy
        #[arg(long, default_value_t = 20)]
        top: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List circular dependencies
    Cycles {
        #[command(flatten)]
        source: GraphSource,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check the graph against the rules in the config file
    Check {
        /// Entry files (default: `check.entrypoints` from the config)
        files: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Explore the graph interactively in the terminal
    Tree {
        /// Entry file; the first one is selected at start
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Start with every file visible
        #[arg(long)]
        overview: bool,
        #[arg(long, value_enum)]
        weighting: Option<WeightingArg>,
    },
    /// Write the graph as JSON and/or Graphviz DOT (DOT to stdout when no file is given)
    Export {
        #[command(flatten)]
        source: GraphSource,
        /// Output JSON file path
        #[arg(long)]
        json: Option<PathBuf>,
        /// Output DOT file path
        #[arg(long)]
        dot: Option<PathBuf>,
        /// DOT: one cluster per directory
        #[arg(long, value_enum, default_value_t = OnOffArg::On)]
        dot_clusters: OnOffArg,
        /// DOT: include legend
        #[arg(long, value_enum, default_value_t = OnOffArg::On)]
        dot_legend: OnOffArg,
        #[arg(long, value_enum, default_value_t = DotThemeArg::Light)]
        dot_theme: DotThemeArg,
        #[arg(long, value_enum, default_value_t = DotRankDirArg::LR)]
        dot_rankdir: DotRankDirArg,
    },
    /// Print a sample config file, or write it to the project root
    Config {
        /// Write .dep-tree.toml instead of printing
        #[arg(long)]
        write: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const SUBCOMMANDS: &[&str] = &["entropy", "cycles", "check", "tree", "export", "config", "completions", "help"];
const PASSTHROUGH: &[&str] = &["-h", "--help", "-V", "--version"];

/// Insert the default `entropy` command when no command name is present.
#[must_use]
pub fn with_default_command<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() <= 1 {
        return args;
    }
    let explicit = args[1..].iter().any(|a| {
        a.to_str().is_some_and(|s| SUBCOMMANDS.contains(&s) || PASSTHROUGH.contains(&s))
    });
    if !explicit {
        args.insert(1, OsString::from("entropy"));
    }
    args
}

/// Parse `std::env::args_os`, exiting with a usage error (code 2) on bad input.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse_from(with_default_command(std::env::args_os()))
}

/// Parse arbitrary arguments; `args[0]` is the binary name.
///
/// # Errors
/// Returns the clap error for invalid arguments.
pub fn try_parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    Cli::try_parse_from(with_default_command(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_files_default_to_entropy() {
        let cli = try_parse_from(["dep-tree", "src/index.ts", "--exclude", "**/*.test.ts"]).unwrap();
        match cli.command {
            Commands::Entropy { source, .. } => assert_eq!(source.files, vec![PathBuf::from("src/index.ts")]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cli.global.exclude, vec!["**/*.test.ts".to_string()]);
    }

    #[test]
    fn explicit_commands_and_global_flags_after_them() {
        let cli = try_parse_from(["dep-tree", "check", "--unwrap-exports", "--js-workspaces", "false"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { .. }));
        assert!(cli.global.unwrap_exports);
        assert_eq!(cli.global.js_workspaces, Some(false));
    }

    #[test]
    fn graph_file_replaces_entries() {
        let cli = try_parse_from(["dep-tree", "cycles", "--graph", "g.json"]).unwrap();
        match cli.command {
            Commands::Cycles { source, .. } => assert_eq!(source.graph, Some(PathBuf::from("g.json"))),
            other => panic!("unexpected {other:?}"),
        }
        assert!(try_parse_from(["dep-tree", "cycles"]).is_err());
    }

    #[test]
    fn invalid_enum_values_are_rejected() {
        assert!(try_parse_from(["dep-tree", "entropy", "a.py", "--format", "xml"]).is_err());
    }
}
