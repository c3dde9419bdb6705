//! Command-line interface for guidepost.
//!
//! This module provides the CLI structure for the `guidepost` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::Verbosity;

pub use commands::{ConfigCommand, FlagCommand, SessionArgs, StatusCommand};

/// guidepost - Guided onboarding for your notes app
///
/// Runs the onboarding overlay in a terminal session and manages the
/// persisted flag that keeps it from opening on every visit.
#[derive(Debug, Parser)]
#[command(name = "guidepost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an interactive onboarding session
    Session(SessionArgs),

    /// Inspect or reset the persisted onboarding flag
    #[command(subcommand)]
    Flag(FlagCommand),

    /// Show storage and onboarding status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "guidepost");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(parse(&["guidepost", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(
            parse(&["guidepost", "-v", "status"]).verbosity(),
            Verbosity::Verbose
        );
        assert_eq!(
            parse(&["guidepost", "-vvv", "status"]).verbosity(),
            Verbosity::Trace
        );
        assert_eq!(
            parse(&["guidepost", "-q", "-v", "status"]).verbosity(),
            Verbosity::Quiet
        );
    }

    #[test]
    fn test_parse_session() {
        let cli = parse(&["guidepost", "session", "--ephemeral", "--delay-ms", "250"]);
        match cli.command {
            Command::Session(cmd) => {
                assert!(cmd.ephemeral);
                assert_eq!(cmd.delay_ms, Some(250));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_flag_reset() {
        let cli = parse(&["guidepost", "flag", "reset", "--yes"]);
        assert!(matches!(
            cli.command,
            Command::Flag(FlagCommand::Reset { yes: true })
        ));
    }

    #[test]
    fn test_parse_flag_status_json() {
        let cli = parse(&["guidepost", "flag", "status", "--json"]);
        assert!(matches!(
            cli.command,
            Command::Flag(FlagCommand::Status { json: true })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["guidepost", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = parse(&["guidepost", "config", "validate", "--file", "x.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["guidepost"]).is_err());
    }
}
