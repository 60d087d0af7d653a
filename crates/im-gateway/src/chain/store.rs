//! Persistence stage

use async_trait::async_trait;
use im_core::{MessageRecord, MessageStore};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{instrument, trace};

use super::{Handler, HandlerError};
use crate::codec::Encoder;

/// Writes every message that reaches it to the message store
pub struct StoreHandler {
    encoder: Arc<dyn Encoder>,
    store: Option<Arc<dyn MessageStore>>,
}

impl StoreHandler {
    /// Without a store every message fails with `NotInitialized`
    pub fn new(encoder: Arc<dyn Encoder>, store: Option<Arc<dyn MessageStore>>) -> Self {
        Self { encoder, store }
    }
}

#[async_trait]
impl Handler for StoreHandler {
    fn name(&self) -> &'static str {
        "store"
    }

    #[instrument(skip_all, name = "store")]
    async fn handle(&self, data: &[u8]) -> Result<ControlFlow<()>, HandlerError> {
        let msg = self.encoder.decode(data)?;
        let store = self
            .store
            .as_ref()
            .ok_or(HandlerError::NotInitialized("message store"))?;

        let record = MessageRecord::from(&msg);
        store.create_message(&record).await?;

        trace!(msg_id = %record.id, "Message stored");
        Ok(ControlFlow::Continue(()))
    }
}

impl std::fmt::Debug for StoreHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandler")
            .field("configured", &self.store.is_some())
            .finish()
    }
}
