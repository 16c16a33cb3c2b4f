//! Record store interface consumed by the reconciliation layer
//!
//! [`RecordStore`] is the only way services and hooks touch persisted state.
//! Writes made through it are plain store operations: they never raise
//! collection events, which is what keeps compensating writes from
//! re-entering the hook chain. Request-originated writes go through
//! [`crate::pipeline::RequestPipeline`] instead.
//!
//! ## Transactions
//!
//! ```text
//! RosterDb::run_in_transaction      Transaction (IMMEDIATE) commit | rollback on drop
//!     └─► TxStore (depth 1)
//!             └─► run_in_transaction SAVEPOINT sp_1 ... RELEASE | ROLLBACK TO on drop
//!                     └─► TxStore (depth 2)
//! ```

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::warn;

use crate::db::models::{Course, ProgressRecord, User, UserId};
use crate::db::{courses, progress, users, CourseQuery, ProgressQuery, RosterDb};
use crate::error::RosterError;

/// Body of a store transaction
pub type TxBody<'a> = &'a mut dyn FnMut(&dyn RecordStore) -> Result<(), RosterError>;

/// CRUD and query access to the roster collections
pub trait RecordStore {
    fn get_user(&self, id: &str) -> Result<Option<User>, RosterError>;

    /// Every current user id, in creation order
    fn list_user_ids(&self) -> Result<Vec<UserId>, RosterError>;

    fn save_user(&self, user: &User) -> Result<(), RosterError>;

    fn get_course(&self, id: &str) -> Result<Option<Course>, RosterError>;

    fn list_courses(&self, query: &CourseQuery) -> Result<Vec<Course>, RosterError>;

    /// Insert or update by id
    fn save_course(&self, course: &Course) -> Result<(), RosterError>;

    fn get_progress(&self, id: &str) -> Result<Option<ProgressRecord>, RosterError>;

    fn list_progress(&self, query: &ProgressQuery) -> Result<Vec<ProgressRecord>, RosterError>;

    /// Insert or update by id
    fn save_progress(&self, progress: &ProgressRecord) -> Result<(), RosterError>;

    /// Returns false if no record had this id
    fn delete_progress(&self, id: &str) -> Result<bool, RosterError>;

    /// Run `body` against an isolated view; its writes commit together or
    /// not at all. Nested calls are allowed.
    fn run_in_transaction(&self, body: TxBody<'_>) -> Result<(), RosterError>;
}

/// Run a transaction that produces a value
pub fn transaction<S, T, F>(store: &S, f: F) -> Result<T, RosterError>
where
    S: RecordStore + ?Sized,
    F: FnOnce(&dyn RecordStore) -> Result<T, RosterError>,
{
    let mut body = Some(f);
    let mut output = None;

    store.run_in_transaction(&mut |tx| {
        let f = body
            .take()
            .ok_or_else(|| RosterError::Internal("transaction body invoked twice".into()))?;
        output = Some(f(tx)?);
        Ok(())
    })?;

    output.ok_or_else(|| RosterError::Internal("transaction body did not run".into()))
}

// ============================================================================
// SQLite implementation
// ============================================================================

impl RecordStore for RosterDb {
    fn get_user(&self, id: &str) -> Result<Option<User>, RosterError> {
        self.with_conn(|conn| users::get_user(conn, id))
    }

    fn list_user_ids(&self) -> Result<Vec<UserId>, RosterError> {
        self.with_conn(users::list_user_ids)
    }

    fn save_user(&self, user: &User) -> Result<(), RosterError> {
        self.with_conn(|conn| users::upsert_user(conn, user))
    }

    fn get_course(&self, id: &str) -> Result<Option<Course>, RosterError> {
        self.with_conn(|conn| courses::get_course(conn, id))
    }

    fn list_courses(&self, query: &CourseQuery) -> Result<Vec<Course>, RosterError> {
        self.with_conn(|conn| courses::list_courses(conn, query))
    }

    fn save_course(&self, course: &Course) -> Result<(), RosterError> {
        self.with_conn(|conn| courses::upsert_course(conn, course))
    }

    fn get_progress(&self, id: &str) -> Result<Option<ProgressRecord>, RosterError> {
        self.with_conn(|conn| progress::get_progress(conn, id))
    }

    fn list_progress(&self, query: &ProgressQuery) -> Result<Vec<ProgressRecord>, RosterError> {
        self.with_conn(|conn| progress::list_progress(conn, query))
    }

    fn save_progress(&self, record: &ProgressRecord) -> Result<(), RosterError> {
        self.with_conn(|conn| progress::upsert_progress(conn, record))
    }

    fn delete_progress(&self, id: &str) -> Result<bool, RosterError> {
        self.with_conn(|conn| progress::delete_progress(conn, id))
    }

    fn run_in_transaction(&self, body: TxBody<'_>) -> Result<(), RosterError> {
        self.with_conn(|conn| run_immediate(conn, body))
    }
}

/// Outermost transaction. The guard rolls back on error or unwind.
fn run_immediate(conn: &Connection, body: TxBody<'_>) -> Result<(), RosterError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| RosterError::Store(format!("Failed to start transaction: {}", e)))?;

    body(&TxStore { conn: &tx, depth: 1 })?;

    tx.commit()
        .map_err(|e| RosterError::Store(format!("Failed to commit transaction: {}", e)))
}

/// Named savepoint that rolls back when dropped unreleased
struct Savepoint<'c> {
    conn: &'c Connection,
    name: String,
    released: bool,
}

impl<'c> Savepoint<'c> {
    fn open(conn: &'c Connection, depth: u32) -> Result<Self, RosterError> {
        let name = format!("sp_{}", depth);
        conn.execute_batch(&format!("SAVEPOINT {}", name))
            .map_err(|e| RosterError::Store(format!("Failed to create savepoint: {}", e)))?;

        Ok(Self {
            conn,
            name,
            released: false,
        })
    }

    fn release(mut self) -> Result<(), RosterError> {
        self.conn
            .execute_batch(&format!("RELEASE {}", self.name))
            .map_err(|e| RosterError::Store(format!("Failed to release savepoint: {}", e)))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self
            .conn
            .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", self.name))
        {
            warn!(savepoint = %self.name, error = %e, "Rollback failed");
        }
    }
}

/// Store view bound to an open transaction on a borrowed connection
struct TxStore<'c> {
    conn: &'c Connection,
    depth: u32,
}

impl RecordStore for TxStore<'_> {
    fn get_user(&self, id: &str) -> Result<Option<User>, RosterError> {
        users::get_user(self.conn, id)
    }

    fn list_user_ids(&self) -> Result<Vec<UserId>, RosterError> {
        users::list_user_ids(self.conn)
    }

    fn save_user(&self, user: &User) -> Result<(), RosterError> {
        users::upsert_user(self.conn, user)
    }

    fn get_course(&self, id: &str) -> Result<Option<Course>, RosterError> {
        courses::get_course(self.conn, id)
    }

    fn list_courses(&self, query: &CourseQuery) -> Result<Vec<Course>, RosterError> {
        courses::list_courses(self.conn, query)
    }

    fn save_course(&self, course: &Course) -> Result<(), RosterError> {
        courses::upsert_course(self.conn, course)
    }

    fn get_progress(&self, id: &str) -> Result<Option<ProgressRecord>, RosterError> {
        progress::get_progress(self.conn, id)
    }

    fn list_progress(&self, query: &ProgressQuery) -> Result<Vec<ProgressRecord>, RosterError> {
        progress::list_progress(self.conn, query)
    }

    fn save_progress(&self, record: &ProgressRecord) -> Result<(), RosterError> {
        progress::upsert_progress(self.conn, record)
    }

    fn delete_progress(&self, id: &str) -> Result<bool, RosterError> {
        progress::delete_progress(self.conn, id)
    }

    fn run_in_transaction(&self, body: TxBody<'_>) -> Result<(), RosterError> {
        let savepoint = Savepoint::open(self.conn, self.depth)?;

        body(&TxStore {
            conn: self.conn,
            depth: self.depth + 1,
        })?;

        savepoint.release()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::db::models::ProgressStatus;

    #[test]
    fn test_transaction_commits() {
        let db = RosterDb::open_in_memory().unwrap();

        let id = transaction(&db, |tx| {
            let record = ProgressRecord::new("c1", "u1", ProgressStatus::NotStarted);
            tx.save_progress(&record)?;
            Ok(record.id)
        })
        .unwrap();

        assert!(db.get_progress(&id).unwrap().is_some());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = RosterDb::open_in_memory().unwrap();

        let result: Result<(), RosterError> = transaction(&db, |tx| {
            tx.save_user(&User::new("u1"))?;
            Err(RosterError::Store("boom".into()))
        });

        assert!(result.is_err());
        assert!(db.get_user("u1").unwrap().is_none());
    }

    #[test]
    fn test_nested_failure_only_rolls_back_inner() {
        let db = RosterDb::open_in_memory().unwrap();

        transaction(&db, |tx| {
            tx.save_user(&User::new("outer"))?;
            let inner: Result<(), RosterError> = transaction(tx, |inner| {
                inner.save_user(&User::new("inner"))?;
                Err(RosterError::Store("inner failed".into()))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        assert!(db.get_user("outer").unwrap().is_some());
        assert!(db.get_user("inner").unwrap().is_none());
    }

    #[test]
    fn test_nested_success_commits_with_outer() {
        let db = RosterDb::open_in_memory().unwrap();

        transaction(&db, |tx| {
            transaction(tx, |inner| inner.save_user(&User::new("u1")))?;
            tx.save_user(&User::new("u2"))
        })
        .unwrap();

        assert_eq!(db.list_user_ids().unwrap(), vec!["u1", "u2"]);
    }

    #[test]
    fn test_panic_in_transaction_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_immediate(&conn, &mut |tx| {
                tx.save_user(&User::new("u1"))?;
                panic!("body panicked");
            })
        }));
        assert!(result.is_err());

        assert!(conn.is_autocommit());
        assert!(users::get_user(&conn, "u1").unwrap().is_none());
    }

    #[test]
    fn test_panic_in_nested_transaction_rolls_back_savepoint() {
        let db = RosterDb::open_in_memory().unwrap();

        transaction(&db, |tx| {
            tx.save_user(&User::new("outer"))?;
            let inner = panic::catch_unwind(AssertUnwindSafe(|| {
                let _ = transaction::<_, (), _>(tx, |inner| {
                    inner.save_user(&User::new("inner"))?;
                    panic!("inner body panicked");
                });
            }));
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        assert_eq!(db.list_user_ids().unwrap(), vec!["outer"]);
    }
}
