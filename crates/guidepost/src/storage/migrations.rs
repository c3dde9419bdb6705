//! Schema versioning for the flag store database.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Ordered migrations. Entry `i` upgrades the schema to version `i + 1`.
///
/// Version 1 is the base schema from `SCHEMA_STATEMENTS`, so it has nothing
/// extra to run.
const MIGRATIONS: &[&[&str]] = &[&[]];

/// The schema version this build expects.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Create the base schema and bring it up to `CURRENT_VERSION`.
///
/// # Errors
///
/// Returns an error if schema creation fails, a migration fails, or the
/// database was written by a newer build.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for target in (version + 1)..=CURRENT_VERSION {
        apply(conn, target)?;
    }
    Ok(())
}

/// Read the stored schema version, 0 for a fresh database.
fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Apply the migration that produces schema `version`.
fn apply(conn: &Connection, version: i32) -> Result<()> {
    let statements = usize::try_from(version - 1)
        .ok()
        .and_then(|index| MIGRATIONS.get(index))
        .ok_or_else(|| Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        })?;

    for statement in *statements {
        conn.execute(statement, [])?;
    }
    set_schema_version(conn, version)?;
    debug!("Migrated flag store schema to version {}", version);
    Ok(())
}
