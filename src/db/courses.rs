//! Courses CRUD operations
//!
//! Assignees are stored as an ordered JSON array in `assignees_json`, bound
//! through rusqlite's `serde_json::Value` conversions.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::Course;
use crate::assignees::Assignees;
use crate::error::RosterError;

/// Equality filters for listing courses
#[derive(Debug, Clone, Default)]
pub struct CourseQuery {
    pub assign_to_everyone: Option<bool>,
}

impl CourseQuery {
    /// Courses flagged to include every user
    pub fn broadcast() -> Self {
        Self {
            assign_to_everyone: Some(true),
        }
    }
}

const COURSE_COLUMNS: &str =
    "id, name, assignees_json, assign_to_everyone, created_at, updated_at";

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    let assignees_json: serde_json::Value = row.get(2)?;
    let assignees: Assignees = serde_json::from_value(assignees_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Course {
        id: row.get(0)?,
        name: row.get(1)?,
        assignees,
        assign_to_everyone: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Get a course by ID
pub fn get_course(conn: &Connection, id: &str) -> Result<Option<Course>, RosterError> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);

    conn.query_row(&sql, params![id], course_from_row)
        .optional()
        .map_err(|e| RosterError::Store(format!("Failed to get course: {}", e)))
}

/// List courses with filtering
pub fn list_courses(conn: &Connection, query: &CourseQuery) -> Result<Vec<Course>, RosterError> {
    let mut sql = format!("SELECT {} FROM courses WHERE 1=1", COURSE_COLUMNS);
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(everyone) = query.assign_to_everyone {
        sql.push_str(" AND assign_to_everyone = ?");
        params_vec.push(Box::new(everyone as i64));
    }

    sql.push_str(" ORDER BY rowid");

    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| RosterError::Store(format!("Failed to prepare statement: {}", e)))?;

    let rows = stmt
        .query_map(params_refs.as_slice(), course_from_row)
        .map_err(|e| RosterError::Store(format!("Failed to query courses: {}", e)))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row.map_err(|e| RosterError::Store(format!("Failed to read row: {}", e)))?);
    }

    Ok(results)
}

/// Insert or update a course by id
pub fn upsert_course(conn: &Connection, course: &Course) -> Result<(), RosterError> {
    let assignees_json = serde_json::to_value(&course.assignees)?;

    conn.execute(
        "INSERT INTO courses (id, name, assignees_json, assign_to_everyone, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
         name = excluded.name,
         assignees_json = excluded.assignees_json,
         assign_to_everyone = excluded.assign_to_everyone,
         updated_at = excluded.updated_at",
        params![
            course.id,
            course.name,
            assignees_json,
            course.assign_to_everyone as i64,
            course.created_at,
            course.updated_at,
        ],
    )
    .map_err(|e| RosterError::Store(format!("Failed to save course: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_preserves_assignee_order() {
        let conn = conn();
        let mut course = Course::new("c1", "Intro");
        course.assignees = Assignees::from_ids(["u3", "u1", "u2"]);
        upsert_course(&conn, &course).unwrap();

        course.assignees.remove("u1");
        course.assign_to_everyone = true;
        upsert_course(&conn, &course).unwrap();

        let stored = get_course(&conn, "c1").unwrap().unwrap();
        assert_eq!(stored.assignees.as_slice(), &["u3", "u2"]);
        assert!(stored.assign_to_everyone);
    }

    #[test]
    fn test_list_broadcast_courses() {
        let conn = conn();
        let mut everyone = Course::new("c1", "All hands");
        everyone.assign_to_everyone = true;
        upsert_course(&conn, &everyone).unwrap();
        upsert_course(&conn, &Course::new("c2", "Elective")).unwrap();

        let broadcast = list_courses(&conn, &CourseQuery::broadcast()).unwrap();
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].id, "c1");

        assert_eq!(list_courses(&conn, &CourseQuery::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_assignees_is_store_error() {
        let conn = conn();
        conn.execute(
            "INSERT INTO courses (id, assignees_json, created_at, updated_at)
             VALUES ('bad', 'not json', '', '')",
            [],
        )
        .unwrap();

        assert!(matches!(get_course(&conn, "bad"), Err(RosterError::Store(_))));
    }

    #[test]
    fn test_assignees_column_is_json_text() {
        let conn = conn();
        let mut course = Course::new("c1", "Intro");
        course.assignees = Assignees::from_ids(["u2", "u1"]);
        upsert_course(&conn, &course).unwrap();

        let (kind, raw): (String, String) = conn
            .query_row(
                "SELECT typeof(assignees_json), assignees_json FROM courses WHERE id = 'c1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(kind, "text");
        assert_eq!(raw, r#"["u2","u1"]"#);
    }
}
