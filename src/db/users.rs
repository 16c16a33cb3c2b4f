//! Users CRUD operations

use rusqlite::{params, Connection, OptionalExtension};

use super::models::{User, UserId};
use crate::error::RosterError;

/// Get a user by ID
pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>, RosterError> {
    conn.query_row(
        "SELECT id, created_at FROM users WHERE id = ?",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                created_at: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(|e| RosterError::Store(format!("Failed to get user: {}", e)))
}

/// All user ids in insertion order
pub fn list_user_ids(conn: &Connection) -> Result<Vec<UserId>, RosterError> {
    let mut stmt = conn
        .prepare("SELECT id FROM users ORDER BY rowid")
        .map_err(|e| RosterError::Store(format!("Failed to prepare statement: {}", e)))?;

    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| RosterError::Store(format!("Failed to query users: {}", e)))?;

    let ids = rows
        .collect::<Result<Vec<String>, _>>()
        .map_err(|e| RosterError::Store(format!("Failed to read row: {}", e)))?;

    Ok(ids)
}

/// Insert a user, or leave an existing row untouched
pub fn upsert_user(conn: &Connection, user: &User) -> Result<(), RosterError> {
    conn.execute(
        "INSERT INTO users (id, created_at) VALUES (?, ?) ON CONFLICT(id) DO NOTHING",
        params![user.id, user.created_at],
    )
    .map_err(|e| RosterError::Store(format!("Failed to save user: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    #[test]
    fn test_user_ids_in_insertion_order() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for id in ["zed", "amy", "bob"] {
            upsert_user(&conn, &User::new(id)).unwrap();
        }
        upsert_user(&conn, &User::new("amy")).unwrap();

        assert_eq!(list_user_ids(&conn).unwrap(), vec!["zed", "amy", "bob"]);
        assert!(get_user(&conn, "bob").unwrap().is_some());
        assert!(get_user(&conn, "nobody").unwrap().is_none());
    }
}
