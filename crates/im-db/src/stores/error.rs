//! Error mapping for stores

use im_core::{DomainError, Snowflake};
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// A primary-key clash means the message was already written
pub fn map_insert_error(e: SqlxError, id: Snowflake) -> DomainError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return DomainError::DuplicateMessage(id);
        }
    }
    map_db_error(e)
}
