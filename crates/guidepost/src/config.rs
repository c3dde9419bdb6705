//! Configuration management for guidepost.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "guidepost";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "storage.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "GUIDEPOST_";

/// Storage keys may only use characters that survive every backing store.
const STORAGE_KEY_PATTERN: &str = r"^[A-Za-z0-9_.:-]+$";

/// A scheme followed by a host, with no path.
const ORIGIN_PATTERN: &str = r"^[a-z][a-z0-9+.-]*://[^/\s]+$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GUIDEPOST_`, nested keys split on `__`)
/// 2. TOML config file at `~/.config/guidepost/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Onboarding overlay configuration.
    pub overlay: OverlayConfig,
    /// Flag store configuration.
    pub storage: StorageConfig,
    /// Host page configuration.
    pub page: PageConfig,
}

/// Onboarding overlay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Instruction texts, shown in order.
    pub instructions: Vec<String>,
    /// Delay before the overlay opens on a first visit, in milliseconds.
    pub first_visit_delay_ms: u64,
    /// Key of the persisted "seen" flag.
    pub storage_key: String,
    /// Acknowledgment shown when the user finishes the last step.
    pub completion_message: String,
}

/// Flag store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/guidepost/storage.db`
    pub database_path: Option<PathBuf>,
    /// Origin the stored keys are scoped to.
    pub origin: String,
}

/// Host page configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Scroll offset in pixels past which the navbar switches style.
    pub navbar_scroll_threshold: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            instructions: default_instructions(),
            first_visit_delay_ms: 5_000,
            storage_key: "hasSeenInstructions".to_string(),
            completion_message: "You're all set! Happy note-taking.".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            origin: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            navbar_scroll_threshold: 50,
        }
    }
}

/// Default onboarding copy.
fn default_instructions() -> Vec<String> {
    vec![
        "Click the + button to open the editor and write your first note.".to_string(),
        "Use the search bar in the navigation to find any note by its title.".to_string(),
    ]
}

fn storage_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(STORAGE_KEY_PATTERN).expect("storage key pattern is valid"))
}

fn origin_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ORIGIN_PATTERN).expect("origin pattern is valid"))
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; defaults and the environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.overlay.instructions.is_empty() {
            return Err(Error::config_validation(
                "overlay.instructions must contain at least one step",
            ));
        }

        if let Some(pos) = self
            .overlay
            .instructions
            .iter()
            .position(|text| text.trim().is_empty())
        {
            return Err(Error::config_validation(format!(
                "overlay.instructions[{pos}] is blank"
            )));
        }

        if !storage_key_regex().is_match(&self.overlay.storage_key) {
            return Err(Error::config_validation(format!(
                "invalid storage key: {:?}",
                self.overlay.storage_key
            )));
        }

        if !origin_regex().is_match(&self.storage.origin) {
            return Err(Error::config_validation(format!(
                "invalid origin: {:?}",
                self.storage.origin
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the first-visit delay as a Duration.
    #[must_use]
    pub fn first_visit_delay(&self) -> Duration {
        Duration::from_millis(self.overlay.first_visit_delay_ms)
    }
}
