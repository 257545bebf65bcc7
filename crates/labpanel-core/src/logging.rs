//! Logging bootstrap for the panel binaries.

use tracing_subscriber::EnvFilter;

/// Filter directive for the given verbosity.
///
/// `--debug` wins over the configured level.
pub fn default_directive(debug: bool, configured: &str) -> String {
    if debug {
        "debug".to_string()
    } else {
        configured.to_lowercase()
    }
}

/// Install the global `fmt` subscriber writing to stdout.
///
/// `RUST_LOG` still takes precedence over the default directive. Calling
/// this twice is harmless; the second call is ignored.
pub fn init(debug: bool, configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug, configured)));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }
}
