//! Tracing subscriber setup for the command-line tool.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `POWLEY_LOG=powley_engine=debug`
pub const LOG_ENV_VAR: &str = "POWLEY_LOG";

static INIT: Once = Once::new();

/// Filter directive used when `POWLEY_LOG` is unset or invalid
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

/// Install a stderr `fmt` subscriber; later calls are no-ops
///
/// `verbose` wins over `POWLEY_LOG`.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let filter = if verbose {
            EnvFilter::new(default_directive(true))
        } else {
            EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
        };

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing(false);
        init_tracing(true);
        tracing::debug!("after init");
    }
}
