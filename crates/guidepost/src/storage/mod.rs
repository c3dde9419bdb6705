//! Persisted key-value storage.
//!
//! The overlay never talks to a concrete store. It receives a [`FlagStore`],
//! which mirrors the browser's origin-scoped local storage: string keys,
//! string values, and no schema beyond that.

mod memory;
pub mod migrations;
pub mod schema;
mod sqlite;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

pub use memory::MemoryFlagStore;
pub use sqlite::SqliteFlagStore;

/// Value written for a set flag.
pub const FLAG_SET: &str = "true";

/// A durable string key-value store scoped to a single origin.
///
/// Implementations must be shareable with the overlay's timer task, hence
/// `Send + Sync`. Every method may fail; callers in the overlay treat failures
/// as degraded storage rather than fatal errors.
pub trait FlagStore: Send + Sync + std::fmt::Debug {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Returns `true` if something was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove_item(&self, key: &str) -> Result<bool>;
}

/// Interpret a stored value as a flag.
///
/// Any non-empty value counts as set; an empty string is treated like an
/// absent key.
#[must_use]
pub fn is_flag_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// One stored item, as listed by [`SqliteFlagStore::entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    /// The item key.
    pub key: String,
    /// The stored value.
    pub value: String,
    /// When the value was last written.
    pub updated_at: DateTime<Utc>,
}
