//! Error types for course-roster

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    /// Referenced course, user or progress record is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any persistence operation failure
    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RosterError {
    /// True for failures that came from the record store itself
    pub fn is_store_failure(&self) -> bool {
        matches!(self, RosterError::Store(_))
    }
}
