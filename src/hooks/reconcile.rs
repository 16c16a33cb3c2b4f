//! Reconciliation hooks
//!
//! Restores the course/progress invariant after each committed mutation:
//! a user is in `course.assignees` exactly when one progress record exists
//! for (course, user).
//!
//! | Event | Reaction |
//! |---|---|
//! | courses:create | resolve broadcast → Not Started progress per assignee |
//! | courses:update | resolve broadcast → diff against snapshot → create/delete progress |
//! | progress:create | add assignee to course (if associated) |
//! | progress:delete | remove assignee from course (if associated) |
//! | progress:update | revert any change to course/assignee |
//! | users:create | join every broadcast course lacking the user |

use std::sync::Arc;

use tracing::debug;

use crate::assignees::project;
use crate::db::models::{Collection, Course, ProgressRecord, ProgressStatus, Record, User};
use crate::error::RosterError;
use crate::services::{BroadcastService, ProgressService, Services};
use crate::store::RecordStore;

use super::{HookRegistry, Operation, RecordEvent};

/// Bind the six reconciliation hooks
pub fn register_reconciliation_hooks(registry: &mut HookRegistry, services: &Services) {
    let (progress, broadcast) = (services.progress.clone(), services.broadcast.clone());
    registry.bind(Collection::Courses, Operation::Create, move |store, event| {
        on_course_created(&progress, &broadcast, store, event)
    });

    let (progress, broadcast) = (services.progress.clone(), services.broadcast.clone());
    registry.bind(Collection::Courses, Operation::Update, move |store, event| {
        on_course_updated(&progress, &broadcast, store, event)
    });

    let progress = services.progress.clone();
    registry.bind(Collection::Progress, Operation::Create, move |store, event| {
        on_progress_created(&progress, store, event)
    });

    let progress = services.progress.clone();
    registry.bind(Collection::Progress, Operation::Delete, move |store, event| {
        on_progress_deleted(&progress, store, event)
    });

    let progress = services.progress.clone();
    registry.bind(Collection::Progress, Operation::Update, move |store, event| {
        on_progress_updated(&progress, store, event)
    });

    let broadcast = services.broadcast.clone();
    registry.bind(Collection::Users, Operation::Create, move |store, event| {
        on_user_created(&broadcast, store, event)
    });
}

fn unexpected(event: &RecordEvent, expected: &str) -> RosterError {
    RosterError::Internal(format!(
        "{} hook received a {} record",
        expected,
        event.collection()
    ))
}

fn course_of(record: &Record, event: &RecordEvent) -> Result<Course, RosterError> {
    record
        .as_course()
        .cloned()
        .ok_or_else(|| unexpected(event, "course"))
}

fn progress_of<'a>(
    record: &'a Record,
    event: &RecordEvent,
) -> Result<&'a ProgressRecord, RosterError> {
    record.as_progress().ok_or_else(|| unexpected(event, "progress"))
}

fn user_of<'a>(record: &'a Record, event: &RecordEvent) -> Result<&'a User, RosterError> {
    record.as_user().ok_or_else(|| unexpected(event, "user"))
}

fn snapshot<'a>(event: &'a RecordEvent) -> Result<&'a Record, RosterError> {
    event.original.as_ref().ok_or_else(|| {
        RosterError::Internal(format!(
            "{} update event without original snapshot",
            event.collection()
        ))
    })
}

// ============================================================================
// Courses
// ============================================================================

fn on_course_created(
    progress: &Arc<ProgressService>,
    broadcast: &Arc<BroadcastService>,
    store: &dyn RecordStore,
    event: &RecordEvent,
) -> Result<(), RosterError> {
    let mut course = course_of(&event.record, event)?;
    let assignees = broadcast.resolve_assignees(store, &mut course)?;

    for assignee in &assignees {
        progress.create_progress(store, &course.id, assignee, ProgressStatus::NotStarted)?;
    }

    debug!(course = %course.id, assignees = assignees.len(), "Reconciled created course");
    Ok(())
}

fn on_course_updated(
    progress: &Arc<ProgressService>,
    broadcast: &Arc<BroadcastService>,
    store: &dyn RecordStore,
    event: &RecordEvent,
) -> Result<(), RosterError> {
    let original = course_of(snapshot(event)?, event)?;
    let mut course = course_of(&event.record, event)?;

    let assignees = broadcast.resolve_assignees(store, &mut course)?;
    let diff = project(&original.assignees, &assignees);
    if diff.is_empty() {
        return Ok(());
    }

    debug!(
        course = %course.id,
        added = diff.added.len(),
        removed = diff.removed.len(),
        "Reconciling course assignee change"
    );
    progress.apply_diff(store, &course.id, &diff)
}

// ============================================================================
// Progress
// ============================================================================

fn on_progress_created(
    progress: &Arc<ProgressService>,
    store: &dyn RecordStore,
    event: &RecordEvent,
) -> Result<(), RosterError> {
    let record = progress_of(&event.record, event)?;
    if !record.is_associated() {
        return Ok(());
    }

    progress.add_assignee_to_course(store, &record.course, &record.assignee)?;
    Ok(())
}

fn on_progress_deleted(
    progress: &Arc<ProgressService>,
    store: &dyn RecordStore,
    event: &RecordEvent,
) -> Result<(), RosterError> {
    let record = progress_of(&event.record, event)?;
    if !record.is_associated() {
        return Ok(());
    }

    progress.remove_assignee_from_course(store, &record.course, &record.assignee)?;
    Ok(())
}

fn on_progress_updated(
    progress: &Arc<ProgressService>,
    store: &dyn RecordStore,
    event: &RecordEvent,
) -> Result<(), RosterError> {
    let original = progress_of(snapshot(event)?, event)?;
    let record = progress_of(&event.record, event)?;

    progress.revert_foreign_keys(store, record, original)?;
    Ok(())
}

// ============================================================================
// Users
// ============================================================================

fn on_user_created(
    broadcast: &Arc<BroadcastService>,
    store: &dyn RecordStore,
    event: &RecordEvent,
) -> Result<(), RosterError> {
    let user = user_of(&event.record, event)?;
    broadcast.assign_new_user(store, &user.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_one_hook_per_trigger() {
        let mut registry = HookRegistry::new();
        register_reconciliation_hooks(&mut registry, &Services::default());

        let bound = [
            (Collection::Courses, Operation::Create),
            (Collection::Courses, Operation::Update),
            (Collection::Progress, Operation::Create),
            (Collection::Progress, Operation::Update),
            (Collection::Progress, Operation::Delete),
            (Collection::Users, Operation::Create),
        ];
        for (collection, operation) in bound {
            assert_eq!(registry.hook_count(collection, operation), 1);
        }

        assert_eq!(registry.hook_count(Collection::Courses, Operation::Delete), 0);
        assert_eq!(registry.hook_count(Collection::Users, Operation::Update), 0);
    }

    #[test]
    fn test_update_without_snapshot_is_internal_error() {
        let db = crate::db::RosterDb::open_in_memory().unwrap();
        let mut registry = HookRegistry::new();
        register_reconciliation_hooks(&mut registry, &Services::default());

        let event = RecordEvent {
            operation: Operation::Update,
            record: Record::Courses(Course::new("c1", "Intro")),
            original: None,
        };

        assert!(matches!(
            registry.trigger(&db, &event),
            Err(RosterError::Internal(_))
        ));
    }
}
