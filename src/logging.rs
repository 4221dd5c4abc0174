//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays reserved for the command's own output.
//! `RUST_LOG` takes precedence over `--verbose` when set.
use tracing_subscriber::EnvFilter;

pub fn setup_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
