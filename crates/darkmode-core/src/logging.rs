//! Logging setup shared by the darkmode binaries.

use tracing_subscriber::EnvFilter;

/// Crates whose log level follows the verbosity flag.
const LOG_TARGETS: &[&str] = &["darkmode", "darkmode_core"];

/// Map a `-v` count to a level name (0 = warn, 1 = info, 2 = debug, 3+ = trace).
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Build the default filter directive string for a verbosity level.
pub fn default_directives(verbose: u8) -> String {
    let level = level_for_verbosity(verbose);
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the verbosity count decides.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}
