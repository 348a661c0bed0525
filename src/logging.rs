//! Tracing subscriber setup for the `mfa` binary.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Pick the log filter: `--verbose` wins, then `RUST_LOG`, then the
/// configured level. An unparseable configured level falls back to `info`.
pub fn build_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match config.level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: logging.level '{}' is not a valid filter ({}); falling back to 'info'",
                    config.level, e
                );
                EnvFilter::new("info")
            }
        },
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// reserved for command output.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config, verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
