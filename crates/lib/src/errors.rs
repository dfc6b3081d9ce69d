use crate::workflow::{PageStatus, WorkflowAction};
use thiserror::Error;

/// Errors raised by the knowledge-base services.
///
/// The variants mirror the taxonomy the HTTP layer maps onto status codes:
/// `NotFound` (404), `Conflict` and `InvalidTransition` (409), `BadRequest`
/// (400). Everything else is an internal failure.
#[derive(Error, Debug)]
pub enum KbError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("Cannot {action} a page in '{from}' status")]
    InvalidTransition {
        from: PageStatus,
        action: WorkflowAction,
    },
    #[error("Database error: {0}")]
    Database(turso::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

impl KbError {
    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        KbError::NotFound(format!("{entity} '{key}' not found"))
    }
}

/// Unique-constraint violations become `Conflict` so callers never see a raw
/// driver error for a duplicate slug, email or name.
impl From<turso::Error> for KbError {
    fn from(err: turso::Error) -> Self {
        let message = err.to_string();
        if message.to_ascii_lowercase().contains("unique constraint") {
            KbError::Conflict(format!("Duplicate value: {message}"))
        } else {
            KbError::Database(err)
        }
    }
}
