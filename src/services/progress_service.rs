//! Progress lifecycle - keeps progress records and course assignees mirrored
//!
//! Course-side changes create or delete progress records; progress-side
//! changes add or remove the assignee on the course. Every method takes the
//! store explicitly so it can run against a plain store or a transaction view.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::assignees::AssigneeDiff;
use crate::db::models::{current_timestamp, ProgressRecord, ProgressStatus};
use crate::db::ProgressQuery;
use crate::error::RosterError;
use crate::store::{transaction, RecordStore};

use super::events::{EventBus, RosterEvent};

/// Progress lifecycle manager
pub struct ProgressService {
    events: Arc<EventBus>,
}

impl ProgressService {
    /// Create a new progress service
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }

    // =========================================================================
    // Course -> progress
    // =========================================================================

    /// Insert a progress record for (course, assignee).
    ///
    /// Does not check for an existing record; callers only invoke this for
    /// assignees they know were just added.
    pub fn create_progress(
        &self,
        store: &dyn RecordStore,
        course_id: &str,
        assignee: &str,
        status: ProgressStatus,
    ) -> Result<ProgressRecord, RosterError> {
        let record = ProgressRecord::new(course_id, assignee, status);
        store.save_progress(&record)?;

        debug!(id = %record.id, course = %course_id, user = %assignee, "Created progress record");
        self.events.emit(RosterEvent::ProgressCreated {
            id: record.id.clone(),
            course_id: course_id.to_string(),
            user_id: assignee.to_string(),
        });

        Ok(record)
    }

    /// Delete every progress record matching (course, assignee).
    ///
    /// Returns the number of records removed; more than one means the natural
    /// key had already been violated.
    pub fn delete_progress(
        &self,
        store: &dyn RecordStore,
        course_id: &str,
        assignee: &str,
    ) -> Result<usize, RosterError> {
        let matches = store.list_progress(&ProgressQuery::natural_key(course_id, assignee))?;

        let mut deleted = 0;
        for record in matches {
            if store.delete_progress(&record.id)? {
                deleted += 1;
                self.events.emit(RosterEvent::ProgressDeleted {
                    id: record.id,
                    course_id: course_id.to_string(),
                    user_id: assignee.to_string(),
                });
            }
        }

        debug!(course = %course_id, user = %assignee, deleted, "Deleted progress records");
        Ok(deleted)
    }

    /// Create progress for every added assignee, then delete progress for every
    /// removed one. Stops at the first failure; earlier steps stay applied.
    pub fn apply_diff(
        &self,
        store: &dyn RecordStore,
        course_id: &str,
        diff: &AssigneeDiff,
    ) -> Result<(), RosterError> {
        for assignee in &diff.added {
            self.create_progress(store, course_id, assignee, ProgressStatus::NotStarted)?;
        }

        for assignee in &diff.removed {
            self.delete_progress(store, course_id, assignee)?;
        }

        Ok(())
    }

    /// Undo a change to `course`/`assignee` on a progress record.
    ///
    /// If either key differs from `original`, both are restored and the record
    /// is saved with its other fields (status included) as updated. Returns
    /// true if a correction was written.
    pub fn revert_foreign_keys(
        &self,
        store: &dyn RecordStore,
        updated: &ProgressRecord,
        original: &ProgressRecord,
    ) -> Result<bool, RosterError> {
        if updated.course == original.course && updated.assignee == original.assignee {
            return Ok(false);
        }

        warn!(
            id = %updated.id,
            course = %updated.course,
            assignee = %updated.assignee,
            "Reverting change to immutable progress fields"
        );

        let mut corrected = updated.clone();
        corrected.course = original.course.clone();
        corrected.assignee = original.assignee.clone();
        corrected.updated_at = current_timestamp();
        store.save_progress(&corrected)?;

        self.events.emit(RosterEvent::ProgressReverted {
            id: corrected.id,
        });

        Ok(true)
    }

    // =========================================================================
    // Progress -> course
    // =========================================================================

    /// Append `assignee` to the course unless already present.
    ///
    /// Idempotent: an existing member causes no write. A missing course is an
    /// error because the progress record references it.
    pub fn add_assignee_to_course(
        &self,
        store: &dyn RecordStore,
        course_id: &str,
        assignee: &str,
    ) -> Result<bool, RosterError> {
        let added = transaction(store, |tx| {
            let mut course = tx
                .get_course(course_id)?
                .ok_or_else(|| RosterError::NotFound(format!("course {}", course_id)))?;

            if !course.assignees.insert(assignee) {
                return Ok(false);
            }

            course.updated_at = current_timestamp();
            tx.save_course(&course)?;
            Ok(true)
        })?;

        if added {
            debug!(course = %course_id, user = %assignee, "Added assignee to course");
            self.events.emit(RosterEvent::AssigneeAdded {
                course_id: course_id.to_string(),
                user_id: assignee.to_string(),
            });
        }

        Ok(added)
    }

    /// Remove `assignee` from the course in one read-modify-write transaction.
    ///
    /// A course that no longer exists is a no-op.
    pub fn remove_assignee_from_course(
        &self,
        store: &dyn RecordStore,
        course_id: &str,
        assignee: &str,
    ) -> Result<bool, RosterError> {
        let removed = transaction(store, |tx| {
            let Some(mut course) = tx.get_course(course_id)? else {
                debug!(course = %course_id, "Course already gone, nothing to remove");
                return Ok(false);
            };

            if !course.assignees.remove(assignee) {
                return Ok(false);
            }

            course.updated_at = current_timestamp();
            tx.save_course(&course)?;
            Ok(true)
        })?;

        if removed {
            debug!(course = %course_id, user = %assignee, "Removed assignee from course");
            self.events.emit(RosterEvent::AssigneeRemoved {
                course_id: course_id.to_string(),
                user_id: assignee.to_string(),
            });
        }

        Ok(removed)
    }
}
