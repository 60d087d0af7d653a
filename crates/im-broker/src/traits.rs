//! Broker capability traits
//!
//! The forward stage only depends on these, so the in-process broker and a
//! wire broker are interchangeable.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::BrokerResult;
use crate::message::BrokerMessage;

#[async_trait]
pub trait Producer: Send + Sync {
    /// Hand a message to the broker. Fails instead of waiting when the topic is full.
    async fn publish(&self, msg: BrokerMessage) -> BrokerResult<()>;

    async fn close(&self) -> BrokerResult<()>;
}

#[async_trait]
pub trait Consumer: Send + Sync {
    /// Register a push handler for a topic
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> BrokerResult<()>;

    /// Drop every handler registered for a topic
    async fn unsubscribe(&self, topic: &str) -> BrokerResult<()>;

    /// Take the next message of a topic, waiting until one is available.
    ///
    /// Callers bound the wait with `tokio::time::timeout`.
    async fn poll(&self, topic: &str) -> BrokerResult<BrokerMessage>;

    async fn close(&self) -> BrokerResult<()>;
}

/// Push-side consumer callback
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, msg: &BrokerMessage) -> BrokerResult<()>;
}
