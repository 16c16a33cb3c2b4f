//! Course Roster - keeps course assignees and progress records consistent
//!
//! Three collections live in the record store: users, courses and progress.
//! A course lists its assignees; each assignee owns exactly one progress
//! record for that course. Reconciliation hooks keep both sides in step no
//! matter which one a request changes.
//!
//! ## Architecture
//!
//! ```text
//! host request ─► RequestPipeline ─► RecordStore (commit)
//!                      │
//!                      └─► HookRegistry (collection, operation)
//!                               │
//!                               ├─► ProgressService   create/delete progress, add/remove assignee
//!                               └─► BroadcastService  assign-to-everyone expansion
//!                                        │
//!                                        └─► RecordStore (plain writes, no events)
//! ```
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/course-roster/
//! ├── roster.db              # SQLite: users, courses, progress
//! └── config.toml            # Configuration
//! ```

pub mod assignees;
pub mod audit;
pub mod config;
pub mod db;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod services;
pub mod store;

// Re-exports
pub use assignees::{project, AssigneeDiff, Assignees};
pub use audit::{verify_consistency, ConsistencyReport, Violation};
pub use config::Config;
pub use db::{Course, ProgressRecord, ProgressStatus, RosterDb, User};
pub use error::RosterError;
pub use hooks::{HookRegistry, Operation, RecordEvent};
pub use pipeline::{
    CreateCourseInput, CreateProgressInput, RequestPipeline, UpdateCourseInput,
    UpdateProgressInput,
};
pub use services::{EventBus, RosterEvent, Services};
pub use store::RecordStore;
