//! Storage port for delivered messages
//!
//! The gateway only needs to write; schema, migrations and queries live with
//! the implementation.

use async_trait::async_trait;

use crate::entities::MessageRecord;
use crate::error::DomainError;

/// Result type for store operations
pub type RepoResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message record
    async fn create_message(&self, record: &MessageRecord) -> RepoResult<()>;
}
