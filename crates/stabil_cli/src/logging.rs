//! Diagnostic tracing for the CLI.
//!
//! Library crates emit `tracing` events; this module installs the one
//! subscriber that prints them. Command output proper goes to stdout and is
//! never routed through here.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, raised to `debug`
/// by `--verbose` or lowered to `error` by `--quiet`. Output: stderr, compact.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_wins_over_quiet() {
        assert_eq!(default_directive(true, true), "debug");
    }

    #[test]
    fn default_is_warn() {
        assert_eq!(default_directive(false, false), "warn");
        assert_eq!(default_directive(false, true), "error");
    }
}
