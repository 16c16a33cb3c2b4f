//! Consistency audit for course assignees and progress records
//!
//! Read-only. Reports every place where `u ∈ course.assignees` and "exactly
//! one progress record for (course, u)" disagree, plus broadcast courses that
//! are missing users. Progress records with an empty course or assignee are
//! not yet associated and are skipped.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::db::{CourseQuery, ProgressQuery};
use crate::error::RosterError;
use crate::store::RecordStore;

/// A single invariant violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Assignee with no progress record
    MissingProgress { course_id: String, user_id: String },
    /// More than one progress record for the same (course, user)
    DuplicateProgress {
        course_id: String,
        user_id: String,
        count: usize,
    },
    /// Progress record whose user is not an assignee of its course
    OrphanProgress {
        progress_id: String,
        course_id: String,
        user_id: String,
    },
    /// Broadcast course without one of the current users
    BroadcastMissingUser { course_id: String, user_id: String },
}

/// Result of a consistency check
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub courses_checked: usize,
    pub progress_checked: usize,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check every course and progress record in `store`
pub fn verify_consistency(store: &dyn RecordStore) -> Result<ConsistencyReport, RosterError> {
    let courses = store.list_courses(&CourseQuery::default())?;
    let records = store.list_progress(&ProgressQuery::default())?;
    let users = store.list_user_ids()?;

    let mut by_key: HashMap<(&str, &str), usize> = HashMap::new();
    for record in records.iter().filter(|r| r.is_associated()) {
        *by_key
            .entry((record.course.as_str(), record.assignee.as_str()))
            .or_default() += 1;
    }

    let mut violations = Vec::new();

    for course in &courses {
        for user_id in &course.assignees {
            match by_key.get(&(course.id.as_str(), user_id.as_str())).copied() {
                None | Some(0) => violations.push(Violation::MissingProgress {
                    course_id: course.id.clone(),
                    user_id: user_id.clone(),
                }),
                Some(1) => {}
                Some(count) => violations.push(Violation::DuplicateProgress {
                    course_id: course.id.clone(),
                    user_id: user_id.clone(),
                    count,
                }),
            }
        }

        if course.assign_to_everyone {
            for user_id in &users {
                if !course.assignees.contains(user_id) {
                    violations.push(Violation::BroadcastMissingUser {
                        course_id: course.id.clone(),
                        user_id: user_id.clone(),
                    });
                }
            }
        }
    }

    let members: HashSet<(&str, &str)> = courses
        .iter()
        .flat_map(|course| {
            course
                .assignees
                .iter()
                .map(move |user_id| (course.id.as_str(), user_id.as_str()))
        })
        .collect();

    for record in records.iter().filter(|r| r.is_associated()) {
        if !members.contains(&(record.course.as_str(), record.assignee.as_str())) {
            violations.push(Violation::OrphanProgress {
                progress_id: record.id.clone(),
                course_id: record.course.clone(),
                user_id: record.assignee.clone(),
            });
        }
    }

    Ok(ConsistencyReport {
        courses_checked: courses.len(),
        progress_checked: records.len(),
        violations,
    })
}
