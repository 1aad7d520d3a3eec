//! Diagnostic logging to stderr

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Environment variable holding an `EnvFilter` directive, e.g. `lsg=debug`.
pub const LOG_ENV: &str = "LSG_LOG";

/// Default level for a given `-v` count.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// Install the global subscriber. Call once near the start of `main`.
///
/// A second call is ignored, so tests that drive `main`-like code can call it
/// freely.
pub fn init(verbosity: u8) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .without_time();

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(filter(verbosity)))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), "warn");
        assert_eq!(level_for(1), "info");
        assert_eq!(level_for(2), "debug");
        assert_eq!(level_for(9), "trace");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(0);
        init(3);
    }
}
