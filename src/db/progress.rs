//! Progress CRUD operations

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{ProgressRecord, ProgressStatus};
use crate::error::RosterError;

/// Equality filters for listing progress records, combined with AND
#[derive(Debug, Clone, Default)]
pub struct ProgressQuery {
    pub course: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<ProgressStatus>,
}

impl ProgressQuery {
    /// Records matching a (course, assignee) natural key
    pub fn natural_key(course: &str, assignee: &str) -> Self {
        Self {
            course: Some(course.to_string()),
            assignee: Some(assignee.to_string()),
            status: None,
        }
    }

    pub fn for_course(course: &str) -> Self {
        Self {
            course: Some(course.to_string()),
            ..Default::default()
        }
    }
}

const PROGRESS_COLUMNS: &str = "id, course, assignee, status, created_at, updated_at";

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<ProgressRecord> {
    let status: String = row.get(3)?;
    let status: ProgressStatus = status
        .parse()
        .map_err(|e: RosterError| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(ProgressRecord {
        id: row.get(0)?,
        course: row.get(1)?,
        assignee: row.get(2)?,
        status,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Get a progress record by ID
pub fn get_progress(conn: &Connection, id: &str) -> Result<Option<ProgressRecord>, RosterError> {
    let sql = format!("SELECT {} FROM progress WHERE id = ?", PROGRESS_COLUMNS);

    conn.query_row(&sql, params![id], progress_from_row)
        .optional()
        .map_err(|e| RosterError::Store(format!("Failed to get progress: {}", e)))
}

/// List progress records with filtering
pub fn list_progress(
    conn: &Connection,
    query: &ProgressQuery,
) -> Result<Vec<ProgressRecord>, RosterError> {
    let mut sql = format!("SELECT {} FROM progress WHERE 1=1", PROGRESS_COLUMNS);
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(course) = &query.course {
        sql.push_str(" AND course = ?");
        params_vec.push(Box::new(course.clone()));
    }

    if let Some(assignee) = &query.assignee {
        sql.push_str(" AND assignee = ?");
        params_vec.push(Box::new(assignee.clone()));
    }

    if let Some(status) = &query.status {
        sql.push_str(" AND status = ?");
        params_vec.push(Box::new(status.as_str()));
    }

    sql.push_str(" ORDER BY rowid");

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| RosterError::Store(format!("Failed to prepare statement: {}", e)))?;

    let rows = stmt
        .query_map(params_refs.as_slice(), progress_from_row)
        .map_err(|e| RosterError::Store(format!("Failed to query progress: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| RosterError::Store(format!("Failed to read row: {}", e)))?);
    }

    Ok(results)
}

/// Insert or update a progress record by id
pub fn upsert_progress(conn: &Connection, progress: &ProgressRecord) -> Result<(), RosterError> {
    conn.execute(
        "INSERT INTO progress (id, course, assignee, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
         course = excluded.course,
         assignee = excluded.assignee,
         status = excluded.status,
         updated_at = excluded.updated_at",
        params![
            progress.id,
            progress.course,
            progress.assignee,
            progress.status.as_str(),
            progress.created_at,
            progress.updated_at,
        ],
    )
    .map_err(|e| RosterError::Store(format!("Failed to save progress: {}", e)))?;

    Ok(())
}

/// Delete a progress record by ID
pub fn delete_progress(conn: &Connection, id: &str) -> Result<bool, RosterError> {
    let rows = conn
        .execute("DELETE FROM progress WHERE id = ?", params![id])
        .map_err(|e| RosterError::Store(format!("Failed to delete progress: {}", e)))?;

    Ok(rows > 0)
}
