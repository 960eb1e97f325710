//! Schema versioning for the local backend database.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Error, Result};

use super::schema::{CREATE_CREATED_AT_INDEXES, CREATE_METADATA_TABLE, TABLE_STATEMENTS};

/// Schema version written by this build.
pub const CURRENT_VERSION: i32 = 1;

const VERSION_KEY: &str = "schema_version";

/// Create missing tables and record the schema version.
///
/// A database written by a newer build is refused rather than modified.
///
/// # Errors
///
/// Returns an error if the stored version is unreadable or newer than
/// [`CURRENT_VERSION`], or if any statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let version = stored_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for statement in TABLE_STATEMENTS {
        conn.execute(statement, [])?;
    }
    conn.execute_batch(CREATE_CREATED_AT_INDEXES)?;

    if version < CURRENT_VERSION {
        store_version(conn, CURRENT_VERSION)?;
    }
    Ok(())
}

/// Stored schema version, 0 for a fresh database.
fn stored_version(conn: &Connection) -> Result<i32> {
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

fn store_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}
