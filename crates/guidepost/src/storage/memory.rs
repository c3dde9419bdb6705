//! In-memory flag store, used for ephemeral sessions and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

use super::FlagStore;

/// A `HashMap`-backed [`FlagStore`].
///
/// The store can be switched into an unavailable mode, in which every call
/// fails the way a browser with storage disabled does.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    items: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryFlagStore {
    /// Create an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `key = value`.
    #[must_use]
    pub fn with_item(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }

    /// Create a store whose every operation fails.
    #[must_use]
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    /// Toggle availability.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of successful `set_item` calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::storage_unavailable(key, "storage is disabled"));
        }
        Ok(())
    }
}

impl FlagStore for MemoryFlagStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check(key)?;
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check(key)?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool> {
        self.check(key)?;
        let removed = self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(removed.is_some())
    }
}
