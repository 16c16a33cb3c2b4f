//! SQLite database module for the roster collections
//!
//! ## Tables
//!
//! - `users` - user identities
//! - `courses` - courses with their assignee list (JSON array) and broadcast flag
//! - `progress` - per-(course, assignee) progress records
//!
//! Row-level CRUD lives in the per-collection modules as free functions over a
//! `&Connection`, so the same code serves both plain and transactional access
//! (see [`crate::store`]).

pub mod schema;
pub mod models;
pub mod users;
pub mod courses;
pub mod progress;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::RosterError;

/// SQLite database holding users, courses and progress
pub struct RosterDb {
    conn: Mutex<Connection>,
}

impl RosterDb {
    /// Open or create the roster database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, RosterError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| RosterError::Store(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| RosterError::Store(format!("Failed to set PRAGMA: {}", e)))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| RosterError::Store(format!("Failed to set busy timeout: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, RosterError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| RosterError::Store(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), RosterError> {
        self.with_conn(schema::init_schema)
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, RosterError>
    where
        F: FnOnce(&Connection) -> Result<T, RosterError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RosterError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, RosterError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, RosterError> {
                let sql = format!("SELECT COUNT(*) FROM {}", table);
                let n: i64 = conn
                    .query_row(&sql, [], |row| row.get(0))
                    .map_err(|e| RosterError::Store(format!("Query failed: {}", e)))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                user_count: count("users")?,
                course_count: count("courses")?,
                progress_count: count("progress")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub user_count: u64,
    pub course_count: u64,
    pub progress_count: u64,
}

// Re-exports
pub use courses::CourseQuery;
pub use models::{Collection, Course, CourseId, ProgressRecord, ProgressStatus, Record, User, UserId};
pub use progress::ProgressQuery;
