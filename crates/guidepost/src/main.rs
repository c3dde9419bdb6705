//! `guidepost` - CLI for the onboarding overlay
//!
//! Hosts the overlay in an interactive terminal session and manages the
//! persisted onboarding flag.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;

use guidepost::cli::{Cli, Command, ConfigCommand, FlagCommand, SessionArgs};
use guidepost::storage::is_flag_set;
use guidepost::{init_logging, Config, FlagStore, MemoryFlagStore, Session, SqliteFlagStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    // Config subcommands inspect the file themselves, so a broken file must
    // not stop them from running.
    let load = || Config::load_from(cli.config.clone()).context("loading configuration");

    match cli.command {
        Command::Session(args) => run_session(load()?, &args).await,
        Command::Flag(flag_cmd) => handle_flag(&load()?, flag_cmd),
        Command::Status(status_cmd) => handle_status(&load()?, status_cmd.json),
        Command::Config(config_cmd) => handle_config(cli.config.as_deref(), config_cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteFlagStore> {
    let path = config.database_path();
    SqliteFlagStore::open(&path, config.storage.origin.clone())
        .with_context(|| format!("opening flag store at {}", path.display()))
}

async fn run_session(mut config: Config, args: &SessionArgs) -> anyhow::Result<()> {
    if let Some(delay_ms) = args.delay_ms {
        config.overlay.first_visit_delay_ms = delay_ms;
    }

    let store: Arc<dyn FlagStore> = if args.ephemeral {
        Arc::new(MemoryFlagStore::new())
    } else {
        Arc::new(open_store(&config)?)
    };

    let mut session = Session::new(&config, store)?;
    if session.overlay().first_visit_pending() {
        println!(
            "Welcome! Instructions will open in {:?}.",
            Duration::from_millis(config.overlay.first_visit_delay_ms)
        );
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    session.run(stdin, &mut stdout).await?;
    session.close();
    Ok(())
}

fn handle_flag(config: &Config, cmd: FlagCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let key = &config.overlay.storage_key;

    match cmd {
        FlagCommand::Status { json } => {
            let value = store.get_item(key)?;
            let seen = is_flag_set(value.as_deref());
            if json {
                let status = serde_json::json!({
                    "origin": store.origin(),
                    "key": key,
                    "value": value,
                    "seen": seen,
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Origin:  {}", store.origin());
                println!("Key:     {key}");
                println!(
                    "Seen:    {}",
                    if seen { "yes" } else { "no (next session is a first visit)" }
                );
            }
        }
        FlagCommand::List => {
            let entries = store.entries()?;
            if entries.is_empty() {
                println!("No stored items for {}", store.origin());
            }
            for entry in entries {
                println!(
                    "{:<24} {:<12} {}",
                    entry.key,
                    entry.value,
                    entry.updated_at.to_rfc3339()
                );
            }
        }
        FlagCommand::Reset { yes } => {
            if !yes {
                println!("This will make the next session behave like a first visit.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            if store.remove_item(key)? {
                println!("Onboarding flag cleared for {}", store.origin());
            } else {
                println!("Onboarding flag was not set for {}", store.origin());
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let path = config.database_path();
    let seen = if path.exists() {
        let store = open_store(config)?;
        Some(is_flag_set(store.get_item(&config.overlay.storage_key)?.as_deref()))
    } else {
        None
    };

    if json {
        let status = serde_json::json!({
            "database_path": path,
            "database_exists": seen.is_some(),
            "origin": config.storage.origin,
            "storage_key": config.overlay.storage_key,
            "seen": seen.unwrap_or(false),
            "steps": config.overlay.instructions.len(),
            "first_visit_delay_ms": config.overlay.first_visit_delay_ms,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("guidepost status");
        println!("----------------");
        println!("Database:      {}", path.display());
        println!("Origin:        {}", config.storage.origin);
        println!(
            "Onboarding:    {}",
            match seen {
                Some(true) => "seen",
                Some(false) => "not seen",
                None => "not seen (no database yet)",
            }
        );
        println!("Steps:         {}", config.overlay.instructions.len());
        println!("First visit:   {:?}", config.first_visit_delay());
    }
    Ok(())
}

fn handle_config(config_path: Option<&Path>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path.map(Path::to_path_buf))
                .context("loading configuration")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Overlay]");
                println!("  Storage key:        {}", config.overlay.storage_key);
                println!("  First visit delay:  {:?}", config.first_visit_delay());
                println!("  Completion message: {}", config.overlay.completion_message);
                for (i, text) in config.overlay.instructions.iter().enumerate() {
                    println!("  Step {}:             {text}", i + 1);
                }
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Origin:             {}", config.storage.origin);
                println!();
                println!("[Page]");
                println!(
                    "  Navbar threshold:   {}px",
                    config.page.navbar_scroll_threshold
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", resolve_config_path(None, config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = resolve_config_path(file, config_path);
            println!("Validating configuration: {}", path.display());
            validate_config_file(&path)?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

/// `--file`, then the global `--config`, then the default location.
fn resolve_config_path(file: Option<PathBuf>, config_path: Option<&Path>) -> PathBuf {
    file.or_else(|| config_path.map(Path::to_path_buf))
        .unwrap_or_else(Config::default_config_path)
}

fn validate_config_file(path: &Path) -> anyhow::Result<Config> {
    Config::load_from(Some(path.to_path_buf()))
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "guidepost_main_{name}_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_validate_config_file_reports_invalid_file() {
        let path = temp_config("invalid", "[overlay]\ninstructions = []\n");

        let result = validate_config_file(&path);
        let _ = std::fs::remove_file(&path);

        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("invalid configuration in"));
        assert!(err.contains("at least one step"));
    }

    #[test]
    fn test_validate_config_file_accepts_valid_file() {
        let path = temp_config("valid", "[overlay]\ninstructions = [\"One\"]\n");

        let result = validate_config_file(&path);
        let _ = std::fs::remove_file(&path);

        assert_eq!(result.unwrap().overlay.instructions, vec!["One"]);
    }

    #[test]
    fn test_invalid_file_fails_validate_command() {
        let path = temp_config("command", "[overlay]\nstorage_key = \"has seen\"\n");

        let result = handle_config(None, ConfigCommand::Validate { file: Some(path.clone()) });
        let _ = std::fs::remove_file(&path);

        assert!(result.is_err());
    }

    #[test]
    fn test_path_command_ignores_broken_config() {
        let path = temp_config("path", "[overlay]\ninstructions = []\n");

        let result = handle_config(Some(path.as_path()), ConfigCommand::Path);
        let _ = std::fs::remove_file(&path);

        assert!(result.is_ok());
    }

    #[test]
    fn test_resolve_config_path_precedence() {
        let global = PathBuf::from("/global/config.toml");
        let file = PathBuf::from("/explicit/config.toml");

        assert_eq!(
            resolve_config_path(Some(file.clone()), Some(global.as_path())),
            file
        );
        assert_eq!(resolve_config_path(None, Some(global.as_path())), global);
        assert_eq!(resolve_config_path(None, None), Config::default_config_path());
    }
}
