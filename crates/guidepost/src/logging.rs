//! Logging setup.
//!
//! Everything in guidepost reports through `tracing`; this module installs the
//! subscriber for the binary.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and above. Degraded storage shows up here.
    #[default]
    Normal,
    /// Debug and above, including every overlay transition.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Map the verbosity onto a tracing level.
    #[must_use]
    pub fn to_level(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::WARN,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Default `EnvFilter` directive for this verbosity.
    #[must_use]
    pub fn directive(&self) -> String {
        format!("guidepost={}", self.to_level())
    }
}

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `verbosity` when set. Logs go to stderr so
/// they do not interleave with the session's rendered overlay on stdout.
///
/// # Examples
///
/// ```no_run
/// use guidepost::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    // A subscriber may already be installed (tests, embedding hosts).
    let _ = subscriber.try_init();
}

/// Minimal logging for tests: warnings and errors through the test writer.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level(), Level::WARN);
        assert_eq!(Verbosity::Verbose.to_level(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level(), Level::TRACE);
    }

    #[test]
    fn test_verbosity_default() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
    }

    #[test]
    fn test_directive() {
        assert_eq!(Verbosity::Verbose.directive(), "guidepost=DEBUG");
        assert_eq!(Verbosity::Quiet.directive(), "guidepost=ERROR");
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        // Only the first call installs a subscriber; later ones are ignored.
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }

    #[test]
    fn test_init_test_logging_does_not_panic() {
        init_test_logging();
    }
}
