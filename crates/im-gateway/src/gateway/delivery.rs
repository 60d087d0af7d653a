//! Broker-side delivery

use async_trait::async_trait;
use im_broker::{BrokerError, BrokerMessage, BrokerResult, MessageHandler};
use std::sync::Arc;
use tracing::debug;

use crate::codec::Encoder;
use crate::registry::Manager;

/// Consumes forwarded messages from the broker and writes them to the
/// recipient's local connections
pub struct DeliveryHandler {
    encoder: Arc<dyn Encoder>,
    manager: Arc<Manager>,
}

impl DeliveryHandler {
    pub fn new(encoder: Arc<dyn Encoder>, manager: Arc<Manager>) -> Self {
        Self { encoder, manager }
    }
}

#[async_trait]
impl MessageHandler for DeliveryHandler {
    async fn handle(&self, msg: &BrokerMessage) -> BrokerResult<()> {
        let message = self
            .encoder
            .decode(&msg.value)
            .map_err(|e| BrokerError::Handler(e.to_string()))?;

        let errors = self.manager.send_message(message.to(), &message).await;
        if let Some(first) = errors.first() {
            return Err(BrokerError::Handler(format!(
                "{} of the recipient's connections failed, first: {first}",
                errors.len()
            )));
        }

        debug!(key = %msg.key, msg_id = %message.id(), "Brokered message delivered");
        Ok(())
    }
}
