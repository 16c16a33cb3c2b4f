//! Record types for the three roster collections
//!
//! - `users` - identity only
//! - `courses` - assignee set plus the assign-to-everyone flag
//! - `progress` - one row per (course, assignee) natural key

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assignees::Assignees;
use crate::error::RosterError;

pub type UserId = String;
pub type CourseId = String;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Generate a record id
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Collections
// ============================================================================

/// Collection a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Courses,
    Progress,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Courses => "courses",
            Collection::Progress => "progress",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub created_at: String,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: current_timestamp(),
        }
    }
}

// ============================================================================
// Courses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub assignees: Assignees,
    pub assign_to_everyone: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Course {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = current_timestamp();
        Self {
            id: id.into(),
            name: name.into(),
            assignees: Assignees::new(),
            assign_to_everyone: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress status values as stored in the `status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "Not Started",
            ProgressStatus::InProgress => "In Progress",
            ProgressStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = RosterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Started" => Ok(ProgressStatus::NotStarted),
            "In Progress" => Ok(ProgressStatus::InProgress),
            "Completed" => Ok(ProgressStatus::Completed),
            other => Err(RosterError::InvalidInput(format!(
                "unknown progress status '{}'",
                other
            ))),
        }
    }
}

/// Progress record. `course` and `assignee` may be empty when the record is
/// not yet associated; both are immutable once set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: String,
    pub course: CourseId,
    pub assignee: UserId,
    pub status: ProgressStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl ProgressRecord {
    pub fn new(
        course: impl Into<String>,
        assignee: impl Into<String>,
        status: ProgressStatus,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: new_record_id(),
            course: course.into(),
            assignee: assignee.into(),
            status,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Both foreign keys are set
    pub fn is_associated(&self) -> bool {
        !self.course.is_empty() && !self.assignee.is_empty()
    }
}

// ============================================================================
// Event payload
// ============================================================================

/// A committed record of any collection, as handed to hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum Record {
    Users(User),
    Courses(Course),
    Progress(ProgressRecord),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Users(_) => Collection::Users,
            Record::Courses(_) => Collection::Courses,
            Record::Progress(_) => Collection::Progress,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Record::Users(user) => &user.id,
            Record::Courses(course) => &course.id,
            Record::Progress(progress) => &progress.id,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Record::Users(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_course(&self) -> Option<&Course> {
        match self {
            Record::Courses(course) => Some(course),
            _ => None,
        }
    }

    pub fn as_progress(&self) -> Option<&ProgressRecord> {
        match self {
            Record::Progress(progress) => Some(progress),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            ProgressStatus::NotStarted,
            ProgressStatus::InProgress,
            ProgressStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<ProgressStatus>().unwrap(), status);
        }
        assert_eq!(ProgressStatus::default(), ProgressStatus::NotStarted);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(matches!(
            "Abandoned".parse::<ProgressStatus>(),
            Err(RosterError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_status_serializes_as_display_string() {
        let json = serde_json::to_string(&ProgressStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn test_progress_association() {
        assert!(ProgressRecord::new("c1", "u1", ProgressStatus::NotStarted).is_associated());
        assert!(!ProgressRecord::new("", "u1", ProgressStatus::NotStarted).is_associated());
        assert!(!ProgressRecord::new("c1", "", ProgressStatus::NotStarted).is_associated());
    }

    #[test]
    fn test_record_collection() {
        let record = Record::Courses(Course::new("c1", "Intro"));
        assert_eq!(record.collection(), Collection::Courses);
        assert_eq!(record.id(), "c1");
        assert_eq!(Collection::Progress.to_string(), "progress");
    }
}
