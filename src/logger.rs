//! Diagnostic logging on stderr.
//!
//! Reports go to stdout; everything emitted through `tracing` goes to stderr
//! so piping a report stays clean. The filter is chosen in this order:
//! `--verbose`, `--quiet`, `RUST_LOG`, then warnings only.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("dep_tree=debug")
    } else if quiet {
        EnvFilter::new("dep_tree=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dep_tree=warn"))
    }
}

/// Install the global subscriber. Later calls are no-ops, so running the CLI
/// several times in one process (tests) is fine.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    let _ = tracing_subscriber::registry().with(filter_for(verbose, quiet)).with(fmt_layer).try_init();
}
