//! Request-facing mutation API
//!
//! The hosting server calls these methods for every user-originated write.
//! Each one commits the record through the store, then raises the
//! post-commit event so the bound hooks can reconcile, and finally returns
//! the record as it reads after reconciliation.
//!
//! Hooks only ever see the store. Their compensating writes therefore never
//! come back through this pipeline and never raise events of their own.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::assignees::Assignees;
use crate::audit::{verify_consistency, ConsistencyReport};
use crate::config::Config;
use crate::db::models::{
    current_timestamp, new_record_id, Course, ProgressRecord, ProgressStatus, Record, User,
};
use crate::error::RosterError;
use crate::hooks::{register_reconciliation_hooks, HookRegistry, RecordEvent};
use crate::services::{EventBus, Services};
use crate::store::{transaction, RecordStore};

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating a course
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCourseInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub assign_to_everyone: bool,
}

/// Partial course update; absent fields are left as stored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseInput {
    pub name: Option<String>,
    pub assignees: Option<Vec<String>>,
    pub assign_to_everyone: Option<bool>,
}

/// Input for creating a progress record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProgressInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub status: ProgressStatus,
}

/// Partial progress update; absent fields are left as stored
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProgressInput {
    pub course: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<ProgressStatus>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Commits request writes and dispatches their post-commit events
pub struct RequestPipeline<S> {
    store: Arc<S>,
    hooks: HookRegistry,
    services: Services,
    atomic: bool,
}

impl<S: RecordStore> RequestPipeline<S> {
    /// Pipeline with the reconciliation hooks bound, configured from `config`
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_channel_capacity));
        Self::with_services(store, Services::new(events), config.atomic_requests)
    }

    /// Pipeline over explicit services
    pub fn with_services(store: Arc<S>, services: Services, atomic: bool) -> Self {
        let mut hooks = HookRegistry::new();
        register_reconciliation_hooks(&mut hooks, &services);

        Self {
            store,
            hooks,
            services,
            atomic,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.services.events.clone()
    }

    /// Run one request. In atomic mode the write and all reconciliation
    /// commit together; otherwise each store call commits on its own.
    fn execute<T, F>(&self, request: F) -> Result<T, RosterError>
    where
        F: FnOnce(&dyn RecordStore) -> Result<T, RosterError>,
    {
        let store: &S = &self.store;
        if self.atomic {
            transaction(store, request)
        } else {
            request(store)
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Create a user and add them to every broadcast course
    pub fn create_user(&self, id: Option<String>) -> Result<User, RosterError> {
        let user = User::new(id.unwrap_or_else(new_record_id));
        if user.id.is_empty() {
            return Err(RosterError::InvalidInput("user id must not be empty".into()));
        }

        self.execute(|store| {
            if store.get_user(&user.id)?.is_some() {
                return Err(RosterError::InvalidInput(format!(
                    "user '{}' already exists",
                    user.id
                )));
            }

            store.save_user(&user)?;
            debug!(user = %user.id, "User created");
            self.hooks
                .trigger(store, &RecordEvent::created(Record::Users(user.clone())))?;
            Ok(user.clone())
        })
    }

    // =========================================================================
    // Courses
    // =========================================================================

    /// Create a course and a Not Started progress record per assignee
    pub fn create_course(&self, input: CreateCourseInput) -> Result<Course, RosterError> {
        let mut course = Course::new(input.id.unwrap_or_else(new_record_id), input.name);
        course.assignees = Assignees::from_ids(input.assignees);
        course.assign_to_everyone = input.assign_to_everyone;

        self.execute(|store| {
            if store.get_course(&course.id)?.is_some() {
                return Err(RosterError::InvalidInput(format!(
                    "course '{}' already exists",
                    course.id
                )));
            }

            store.save_course(&course)?;
            debug!(course = %course.id, "Course created");
            self.hooks
                .trigger(store, &RecordEvent::created(Record::Courses(course.clone())))?;
            reread_course(store, &course.id)
        })
    }

    /// Update a course; progress records follow the assignee change
    pub fn update_course(&self, id: &str, input: UpdateCourseInput) -> Result<Course, RosterError> {
        self.execute(|store| {
            let original = store
                .get_course(id)?
                .ok_or_else(|| RosterError::NotFound(format!("course {}", id)))?;

            let mut updated = original.clone();
            if let Some(name) = input.name {
                updated.name = name;
            }
            if let Some(assignees) = input.assignees {
                updated.assignees = Assignees::from_ids(assignees);
            }
            if let Some(everyone) = input.assign_to_everyone {
                updated.assign_to_everyone = everyone;
            }
            updated.updated_at = current_timestamp();

            store.save_course(&updated)?;
            debug!(course = %id, "Course updated");
            self.hooks.trigger(
                store,
                &RecordEvent::updated(Record::Courses(updated), Record::Courses(original)),
            )?;
            reread_course(store, id)
        })
    }

    // =========================================================================
    // Progress
    // =========================================================================

    /// Create a progress record; its assignee joins the course
    pub fn create_progress(&self, input: CreateProgressInput) -> Result<ProgressRecord, RosterError> {
        let mut record = ProgressRecord::new(input.course, input.assignee, input.status);
        if let Some(id) = input.id {
            record.id = id;
        }

        self.execute(|store| {
            if store.get_progress(&record.id)?.is_some() {
                return Err(RosterError::InvalidInput(format!(
                    "progress '{}' already exists",
                    record.id
                )));
            }

            store.save_progress(&record)?;
            debug!(id = %record.id, course = %record.course, user = %record.assignee, "Progress created");
            self.hooks
                .trigger(store, &RecordEvent::created(Record::Progress(record.clone())))?;
            reread_progress(store, &record.id)
        })
    }

    /// Update a progress record. Only `status` survives reconciliation;
    /// course/assignee changes are reverted.
    pub fn update_progress(
        &self,
        id: &str,
        input: UpdateProgressInput,
    ) -> Result<ProgressRecord, RosterError> {
        self.execute(|store| {
            let original = store
                .get_progress(id)?
                .ok_or_else(|| RosterError::NotFound(format!("progress {}", id)))?;

            let mut updated = original.clone();
            if let Some(course) = input.course {
                updated.course = course;
            }
            if let Some(assignee) = input.assignee {
                updated.assignee = assignee;
            }
            if let Some(status) = input.status {
                updated.status = status;
            }
            updated.updated_at = current_timestamp();

            store.save_progress(&updated)?;
            debug!(id = %id, status = %updated.status, "Progress updated");
            self.hooks.trigger(
                store,
                &RecordEvent::updated(Record::Progress(updated), Record::Progress(original)),
            )?;
            reread_progress(store, id)
        })
    }

    /// Delete a progress record; its assignee leaves the course.
    /// Returns the deleted record.
    pub fn delete_progress(&self, id: &str) -> Result<ProgressRecord, RosterError> {
        self.execute(|store| {
            let record = store
                .get_progress(id)?
                .ok_or_else(|| RosterError::NotFound(format!("progress {}", id)))?;

            store.delete_progress(id)?;
            debug!(id = %id, course = %record.course, user = %record.assignee, "Progress deleted");
            self.hooks
                .trigger(store, &RecordEvent::deleted(Record::Progress(record.clone())))?;
            Ok(record)
        })
    }

    // =========================================================================
    // Audit
    // =========================================================================

    /// Check the course/progress invariant across the whole store
    pub fn verify(&self) -> Result<ConsistencyReport, RosterError> {
        verify_consistency(self.store.as_ref())
    }
}

fn reread_course(store: &dyn RecordStore, id: &str) -> Result<Course, RosterError> {
    store
        .get_course(id)?
        .ok_or_else(|| RosterError::NotFound(format!("course {}", id)))
}

fn reread_progress(store: &dyn RecordStore, id: &str) -> Result<ProgressRecord, RosterError> {
    store
        .get_progress(id)?
        .ok_or_else(|| RosterError::NotFound(format!("progress {}", id)))
}
