//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::RosterError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), RosterError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(RosterError::Store(format!(
            "Database schema v{} is newer than supported v{}",
            current_version, SCHEMA_VERSION
        )));
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, RosterError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| RosterError::Store(format!("Failed to create schema_version table: {}", e)))?;

    match conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0)) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(RosterError::Store(format!("Failed to read schema_version: {}", e))),
    }
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), RosterError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| RosterError::Store(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| RosterError::Store(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), RosterError> {
    conn.execute_batch(ROSTER_SCHEMA)
        .map_err(|e| RosterError::Store(format!("Failed to create roster tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| RosterError::Store(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Users, courses and progress tables.
///
/// `progress.course` / `progress.assignee` are plain TEXT without foreign keys
/// or a unique constraint: records may exist unassociated, and the natural key
/// is maintained by reconciliation rather than the database.
const ROSTER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    assignees_json TEXT NOT NULL DEFAULT '[]',
    assign_to_everyone INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS progress (
    id TEXT PRIMARY KEY NOT NULL,
    course TEXT NOT NULL DEFAULT '',
    assignee TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'Not Started',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_courses_everyone ON courses(assign_to_everyone);
CREATE INDEX IF NOT EXISTS idx_progress_natural_key ON progress(course, assignee);
CREATE INDEX IF NOT EXISTS idx_progress_assignee ON progress(assignee);
"#;
