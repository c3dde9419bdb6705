//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Session command arguments.
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Keep the seen flag in memory only (every run is a first visit)
    #[arg(short, long)]
    pub ephemeral: bool,

    /// Override the first-visit delay in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub delay_ms: Option<u64>,
}

/// Persisted flag commands.
#[derive(Debug, Subcommand)]
pub enum FlagCommand {
    /// Show whether the onboarding flag is set
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List every stored item for the configured origin
    List,

    /// Remove the onboarding flag so the next session is a first visit
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_args_debug() {
        let cmd = SessionArgs {
            ephemeral: true,
            delay_ms: Some(10),
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("ephemeral"));
        assert!(debug_str.contains("10"));
    }

    #[test]
    fn test_flag_command_debug() {
        let cmd = FlagCommand::Reset { yes: true };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Reset"));
        assert!(debug_str.contains("yes"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        assert!(format!("{cmd:?}").contains("Show"));
    }
}
