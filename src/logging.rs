//! Structured logging setup for binaries and tests.

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{GraphError, Result};

/// Installs a global `tracing` subscriber filtered by `level`, which takes
/// any `EnvFilter` directive such as `info` or `umbra::fieldaccess=debug`.
/// Logs go to stderr so command output stays parseable.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| GraphError::InvalidArgument(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| GraphError::InvalidArgument("logging already initialized".into()))
}

/// Filter directive for a `-v` count: warnings by default, then info,
/// debug and trace for this crate.
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "umbra=info",
        2 => "umbra=debug",
        _ => "umbra=trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directives() {
        let err = init_logging("umbra=loud").unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn verbosity_saturates_at_trace() {
        assert_eq!(level_for_verbosity(0), "warn");
        assert_eq!(level_for_verbosity(9), "umbra=trace");
    }
}
