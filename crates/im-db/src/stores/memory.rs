//! In-memory MessageStore for tests and local runs

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use im_core::{DomainError, MessageRecord, MessageStore, RepoResult};

#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    records: Mutex<Vec<MessageRecord>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored so far, in insertion order
    pub fn records(&self) -> Vec<MessageRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create_message(&self, record: &MessageRecord) -> RepoResult<()> {
        let mut records = self.records.lock();
        if records.iter().any(|r| r.id == record.id) {
            return Err(DomainError::DuplicateMessage(record.id));
        }
        records.push(record.clone());
        debug!(id = %record.id, total = records.len(), "Message stored in memory");
        Ok(())
    }
}
