//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Message already stored: {0}")]
    DuplicateMessage(Snowflake),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    /// Stable error code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateMessage(_) => "DUPLICATE_MESSAGE",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::Unavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::DuplicateMessage(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }
}
