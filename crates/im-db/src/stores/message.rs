//! PostgreSQL implementation of MessageStore

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use im_core::{MessageRecord, MessageStore, RepoResult};

use super::error::map_insert_error;

/// Writes delivered messages to the `messages` table
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    #[instrument(skip(self, record), fields(id = %record.id, from = %record.from_id, to = %record.to_id))]
    async fn create_message(&self, record: &MessageRecord) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO messages (id, type, content, from_id, to_id, status, platform, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(record.id.into_inner())
        .bind(record.msg_type.as_str())
        .bind(&record.content)
        .bind(&record.from_id)
        .bind(&record.to_id)
        .bind(record.status.code())
        .bind(record.platform)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, record.id))?;

        Ok(())
    }
}

impl std::fmt::Debug for PgMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgMessageStore").finish_non_exhaustive()
    }
}
