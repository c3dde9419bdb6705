//! `SQLite` schema definitions for the flag store.

/// Origin-scoped key-value table, one row per stored item.
pub const CREATE_LOCAL_STORAGE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS local_storage (
    origin TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (origin, key)
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_LOCAL_STORAGE_TABLE, CREATE_METADATA_TABLE];
