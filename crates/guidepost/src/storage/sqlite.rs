//! `SQLite`-backed flag store.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{migrations, FlagStore, StoredEntry};

/// Durable [`FlagStore`] on top of a `SQLite` file.
///
/// Several origins can share one database file; every row carries the origin
/// it belongs to and a store only ever sees its own rows.
#[derive(Debug)]
pub struct SqliteFlagStore {
    /// Path to the database file.
    path: PathBuf,
    /// Origin this store is scoped to.
    origin: String,
    /// Database connection. `Connection` is not `Sync`.
    conn: Mutex<Connection>,
}

impl SqliteFlagStore {
    /// Open or create a store at `path`, scoped to `origin`.
    ///
    /// Creates parent directories and initializes the schema as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>, origin: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening flag store at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        let origin = origin.into();
        info!("Flag store opened at {} for {}", path.display(), origin);
        Ok(Self {
            path,
            origin,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(origin: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            origin: origin.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the origin this store is scoped to.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// List every item stored for this origin, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn entries(&self) -> Result<Vec<StoredEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            r"
            SELECT key, value, updated_at FROM local_storage
            WHERE origin = ?1 ORDER BY key
            ",
        )?;

        let entries = stmt
            .query_map([&self.origin], |row| {
                let key: String = row.get(0)?;
                let value: String = row.get(1)?;
                let updated_at: String = row.get(2)?;
                Ok((key, value, updated_at))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(key, value, updated_at)| StoredEntry {
                updated_at: parse_timestamp(&key, &updated_at),
                key,
                value,
            })
            .collect();

        Ok(entries)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_timestamp(key: &str, raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| {
            warn!("Unparseable timestamp {:?} on key {}, using now", raw, key);
            Utc::now()
        },
        |dt| dt.with_timezone(&Utc),
    )
}

impl FlagStore for SqliteFlagStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM local_storage WHERE origin = ?1 AND key = ?2",
                params![self.origin, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            r"
            INSERT INTO local_storage (origin, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (origin, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
            params![self.origin, key, value, Utc::now().to_rfc3339()],
        )?;
        debug!("Stored {} for {}", key, self.origin);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM local_storage WHERE origin = ?1 AND key = ?2",
            params![self.origin, key],
        )?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://localhost:3000";

    fn create_test_store() -> SqliteFlagStore {
        SqliteFlagStore::open_in_memory(ORIGIN).expect("failed to create test store")
    }

    fn temp_db(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("guidepost_{name}_{}.db", std::process::id()))
    }

    fn cleanup(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_get_missing() {
        let store = create_test_store();
        assert_eq!(store.get_item("hasSeenInstructions").unwrap(), None);
    }

    #[test]
    fn test_set_and_get() {
        let store = create_test_store();
        store.set_item("hasSeenInstructions", "true").unwrap();
        assert_eq!(
            store.get_item("hasSeenInstructions").unwrap().as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_set_overwrites() {
        let store = create_test_store();
        store.set_item("theme", "light").unwrap();
        store.set_item("theme", "dark").unwrap();

        assert_eq!(store.get_item("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = create_test_store();
        store.set_item("hasSeenInstructions", "true").unwrap();

        assert!(store.remove_item("hasSeenInstructions").unwrap());
        assert!(!store.remove_item("hasSeenInstructions").unwrap());
        assert_eq!(store.get_item("hasSeenInstructions").unwrap(), None);
    }

    #[test]
    fn test_entries_sorted_by_key() {
        let store = create_test_store();
        store.set_item("zeta", "1").unwrap();
        store.set_item("alpha", "2").unwrap();

        let keys: Vec<_> = store.entries().unwrap().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_origin_accessor() {
        let store = create_test_store();
        assert_eq!(store.origin(), ORIGIN);
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_origins_are_isolated() {
        let path = temp_db("origins");
        cleanup(&path);

        let local = SqliteFlagStore::open(&path, ORIGIN).unwrap();
        let prod = SqliteFlagStore::open(&path, "https://notes.example.com").unwrap();

        local.set_item("hasSeenInstructions", "true").unwrap();
        assert_eq!(prod.get_item("hasSeenInstructions").unwrap(), None);
        assert!(prod.entries().unwrap().is_empty());
        assert!(!prod.remove_item("hasSeenInstructions").unwrap());
        assert!(local.get_item("hasSeenInstructions").unwrap().is_some());

        drop(local);
        drop(prod);
        cleanup(&path);
    }

    #[test]
    fn test_survives_reopen() {
        let path = temp_db("reopen");
        cleanup(&path);

        {
            let store = SqliteFlagStore::open(&path, ORIGIN).unwrap();
            store.set_item("hasSeenInstructions", "true").unwrap();
        }

        let store = SqliteFlagStore::open(&path, ORIGIN).unwrap();
        assert_eq!(
            store.get_item("hasSeenInstructions").unwrap().as_deref(),
            Some("true")
        );
        assert_eq!(store.path(), path);

        drop(store);
        cleanup(&path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("guidepost_nested_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        let nested = root.join("a/b/storage.db");

        let store = SqliteFlagStore::open(&nested, ORIGIN).unwrap();
        assert!(nested.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_entries_carry_timestamps() {
        let store = create_test_store();
        let before = Utc::now();
        store.set_item("hasSeenInstructions", "true").unwrap();

        let entries = store.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].updated_at >= before - chrono::Duration::seconds(1));
    }

    #[test]
    fn test_unparseable_timestamp_falls_back() {
        let ts = parse_timestamp("k", "not a date");
        assert!(ts <= Utc::now());
    }
}
