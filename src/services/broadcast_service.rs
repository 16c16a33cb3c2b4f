//! Broadcast resolution for courses assigned to everyone
//!
//! A broadcast course's assignee list is re-derived from the user table on
//! every course write that passes through [`BroadcastService::resolve_assignees`],
//! and extended one user at a time by
//! [`BroadcastService::assign_new_user`] when users are created.

use std::sync::Arc;

use tracing::{debug, info};

use crate::assignees::Assignees;
use crate::db::models::{current_timestamp, Course, CourseId, ProgressStatus};
use crate::db::CourseQuery;
use crate::error::RosterError;
use crate::store::{transaction, RecordStore};

use super::events::{EventBus, RosterEvent};
use super::progress_service::ProgressService;

/// Broadcast resolver
pub struct BroadcastService {
    progress: Arc<ProgressService>,
    events: Arc<EventBus>,
}

impl BroadcastService {
    /// Create a new broadcast service
    pub fn new(progress: Arc<ProgressService>, events: Arc<EventBus>) -> Self {
        Self { progress, events }
    }

    /// Final assignee set for `course`.
    ///
    /// Non-broadcast courses are returned unchanged. Broadcast courses get
    /// their assignees replaced by every current user; the course is persisted
    /// and `course` is updated in place. An empty user table yields an empty
    /// set.
    pub fn resolve_assignees(
        &self,
        store: &dyn RecordStore,
        course: &mut Course,
    ) -> Result<Assignees, RosterError> {
        if !course.assign_to_everyone {
            return Ok(course.assignees.clone());
        }

        let resolved = transaction(store, |tx| {
            let mut stored = tx
                .get_course(&course.id)?
                .ok_or_else(|| RosterError::NotFound(format!("course {}", course.id)))?;

            stored.assignees = Assignees::from_ids(tx.list_user_ids()?);
            stored.updated_at = current_timestamp();
            tx.save_course(&stored)?;
            Ok(stored)
        })?;

        debug!(
            course = %resolved.id,
            assignees = resolved.assignees.len(),
            "Resolved broadcast assignees"
        );
        self.events.emit(RosterEvent::BroadcastExpanded {
            course_id: resolved.id.clone(),
            assignee_count: resolved.assignees.len(),
        });

        *course = resolved;
        Ok(course.assignees.clone())
    }

    /// Add a newly created user to every broadcast course that lacks them and
    /// give them a Not Started progress record there.
    ///
    /// Each course is reconciled in its own transaction; a failure stops the
    /// loop and leaves earlier courses reconciled. Returns the ids of the
    /// courses that were changed.
    pub fn assign_new_user(
        &self,
        store: &dyn RecordStore,
        user_id: &str,
    ) -> Result<Vec<CourseId>, RosterError> {
        let courses = store.list_courses(&CourseQuery::broadcast())?;
        let mut changed = Vec::new();

        for course in courses {
            if course.assignees.contains(user_id) {
                continue;
            }

            let added = transaction(store, |tx| {
                // Re-read inside the transaction; the listing above may be stale
                let Some(mut current) = tx.get_course(&course.id)? else {
                    return Ok(false);
                };
                if !current.assign_to_everyone || !current.assignees.insert(user_id) {
                    return Ok(false);
                }

                current.updated_at = current_timestamp();
                tx.save_course(&current)?;
                self.progress
                    .create_progress(tx, &current.id, user_id, ProgressStatus::NotStarted)?;
                Ok(true)
            })?;

            if added {
                self.events.emit(RosterEvent::AssigneeAdded {
                    course_id: course.id.clone(),
                    user_id: user_id.to_string(),
                });
                changed.push(course.id);
            }
        }

        if !changed.is_empty() {
            info!(user = %user_id, courses = changed.len(), "Assigned new user to broadcast courses");
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::User;
    use crate::db::{ProgressQuery, RosterDb};

    fn setup() -> (RosterDb, BroadcastService) {
        let events = Arc::new(EventBus::new());
        let progress = Arc::new(ProgressService::new(events.clone()));
        (RosterDb::open_in_memory().unwrap(), BroadcastService::new(progress, events))
    }

    #[test]
    fn test_non_broadcast_course_unchanged() {
        let (db, service) = setup();
        db.save_user(&User::new("u9")).unwrap();

        let mut course = Course::new("c1", "Elective");
        course.assignees = Assignees::from_ids(["u1", "u2"]);
        db.save_course(&course).unwrap();

        let resolved = service.resolve_assignees(&db, &mut course).unwrap();
        assert_eq!(resolved.as_slice(), &["u1", "u2"]);
        assert_eq!(db.get_course("c1").unwrap().unwrap().assignees, resolved);
    }

    #[test]
    fn test_broadcast_course_gets_every_user() {
        let (db, service) = setup();
        db.save_user(&User::new("u1")).unwrap();
        db.save_user(&User::new("u2")).unwrap();

        let mut course = Course::new("c1", "All hands");
        course.assign_to_everyone = true;
        course.assignees = Assignees::from_ids(["stale"]);
        db.save_course(&course).unwrap();

        let resolved = service.resolve_assignees(&db, &mut course).unwrap();
        assert_eq!(resolved.as_slice(), &["u1", "u2"]);
        assert_eq!(course.assignees, resolved);
        assert_eq!(db.get_course("c1").unwrap().unwrap().assignees, resolved);
    }

    #[test]
    fn test_broadcast_with_no_users_is_empty() {
        let (db, service) = setup();

        let mut course = Course::new("c1", "All hands");
        course.assign_to_everyone = true;
        course.assignees = Assignees::from_ids(["u1"]);
        db.save_course(&course).unwrap();

        let resolved = service.resolve_assignees(&db, &mut course).unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_assign_new_user_only_touches_broadcast_courses() {
        let (db, service) = setup();

        let mut everyone = Course::new("c1", "All hands");
        everyone.assign_to_everyone = true;
        db.save_course(&everyone).unwrap();

        let mut already = Course::new("c2", "All hands, already assigned");
        already.assign_to_everyone = true;
        already.assignees = Assignees::from_ids(["u1"]);
        db.save_course(&already).unwrap();

        db.save_course(&Course::new("c3", "Elective")).unwrap();

        let changed = service.assign_new_user(&db, "u1").unwrap();
        assert_eq!(changed, vec!["c1"]);

        assert!(db.get_course("c1").unwrap().unwrap().assignees.contains("u1"));
        assert!(db.get_course("c3").unwrap().unwrap().assignees.is_empty());

        let records = db.list_progress(&ProgressQuery::natural_key("c1", "u1")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ProgressStatus::NotStarted);
        assert!(db
            .list_progress(&ProgressQuery::natural_key("c2", "u1"))
            .unwrap()
            .is_empty());
    }
}
