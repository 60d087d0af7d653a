//! Forward stage

use async_trait::async_trait;
use im_broker::{BrokerMessage, Producer};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{Handler, HandlerError};
use crate::codec::Encoder;
use crate::registry::Manager;

enum Route {
    Direct(Arc<Manager>),
    Broker {
        producer: Arc<dyn Producer>,
        topic: String,
    },
}

/// Routes payload-bearing messages to their recipient.
///
/// Messages without a recipient, or of a kind that carries no user content,
/// pass through untouched.
pub struct ForwardHandler {
    encoder: Arc<dyn Encoder>,
    route: Route,
}

impl ForwardHandler {
    /// Deliver straight to the recipient's connections on this gateway
    pub fn direct(encoder: Arc<dyn Encoder>, manager: Arc<Manager>) -> Self {
        Self {
            encoder,
            route: Route::Direct(manager),
        }
    }

    /// Publish to `topic` for a consumer to deliver
    pub fn broker(
        encoder: Arc<dyn Encoder>,
        producer: Arc<dyn Producer>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            encoder,
            route: Route::Broker {
                producer,
                topic: topic.into(),
            },
        }
    }
}

/// Partition key of a forwarded message
pub(crate) fn routing_key(from: &str, to: &str) -> String {
    format!("message:{from}:{to}")
}

#[async_trait]
impl Handler for ForwardHandler {
    fn name(&self) -> &'static str {
        "forward"
    }

    #[instrument(skip_all, name = "forward")]
    async fn handle(&self, data: &[u8]) -> Result<ControlFlow<()>, HandlerError> {
        let msg = self.encoder.decode(data)?;
        if !msg.msg_type().is_payload_bearing() || msg.to().is_empty() {
            return Ok(ControlFlow::Continue(()));
        }

        match &self.route {
            Route::Direct(manager) => {
                let errors = manager.send_message(msg.to(), &msg).await;
                if !errors.is_empty() {
                    return Err(HandlerError::Delivery {
                        to: msg.to().to_string(),
                        errors,
                    });
                }
                debug!(msg_id = %msg.id(), to = %msg.to(), "Message forwarded");
            }
            Route::Broker { producer, topic } => {
                let out = BrokerMessage::new(topic.as_str(), data)
                    .with_key(routing_key(msg.from(), msg.to()))
                    .with_header("type", msg.msg_type().as_str());
                producer.publish(out).await?;
                debug!(msg_id = %msg.id(), topic = %topic, "Message published");
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}

impl std::fmt::Debug for ForwardHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.route {
            Route::Direct(_) => "direct",
            Route::Broker { .. } => "broker",
        };
        f.debug_struct("ForwardHandler").field("mode", &mode).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonEncoder;
    use crate::connection::mock::MockConn;
    use im_broker::{BrokerError, Consumer, MemoryBroker};
    use im_common::WorkerPool;
    use im_core::{Message, MessageType, SnowflakeGenerator};
    use std::time::Duration;

    fn encode(kind: MessageType, from: &str, to: &str) -> Vec<u8> {
        let ids = SnowflakeGenerator::new(3).unwrap();
        JsonEncoder
            .encode(&Message::new(&ids, kind, from, to, 1, "hello"))
            .unwrap()
    }

    fn direct(pool: &Arc<WorkerPool>) -> (ForwardHandler, Arc<Manager>) {
        let manager = Manager::new_shared(Arc::clone(pool));
        (
            ForwardHandler::direct(Arc::new(JsonEncoder), Arc::clone(&manager)),
            manager,
        )
    }

    #[tokio::test]
    async fn test_direct_delivers_to_recipient() {
        let pool = WorkerPool::new_shared(1, 16);
        let (handler, manager) = direct(&pool);
        let u2 = MockConn::connected(1);
        manager.add_conn("u2", 1, u2.clone());

        let flow = handler
            .handle(&encode(MessageType::Text, "u1", "u2"))
            .await
            .unwrap();
        assert!(flow.is_continue());

        let sent = u2.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from(), "u1");
        assert_eq!(sent[0].payload(), b"hello");
    }

    #[tokio::test]
    async fn test_skips_non_routable_messages() {
        let pool = WorkerPool::new_shared(1, 16);
        let (handler, manager) = direct(&pool);
        let u2 = MockConn::connected(1);
        manager.add_conn("u2", 1, u2.clone());

        for data in [
            encode(MessageType::System, "u1", "u2"),
            encode(MessageType::Custom, "u1", "u2"),
            encode(MessageType::Text, "u1", ""),
        ] {
            assert!(handler.handle(&data).await.unwrap().is_continue());
        }
        assert!(u2.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_is_an_error() {
        let pool = WorkerPool::new_shared(1, 16);
        let (handler, manager) = direct(&pool);
        let u2 = MockConn::connected(1);
        u2.break_transport();
        manager.add_conn("u2", 1, u2);

        let err = handler
            .handle(&encode(MessageType::Image, "u1", "u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Delivery { ref errors, .. } if errors.len() == 1));
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let pool = WorkerPool::new_shared(1, 16);
        let (handler, _) = direct(&pool);
        assert!(matches!(
            handler.handle(b"not json").await,
            Err(HandlerError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_broker_mode_publishes_keyed_message() {
        let pool = WorkerPool::new_shared(1, 16);
        let broker = MemoryBroker::new_shared(8, pool);
        let handler = ForwardHandler::broker(
            Arc::new(JsonEncoder),
            Arc::clone(&broker) as Arc<dyn Producer>,
            "im.messages",
        );
        let data = encode(MessageType::Text, "u1", "u2");

        handler.handle(&data).await.unwrap();

        let published = tokio::time::timeout(Duration::from_secs(1), broker.poll("im.messages"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.key, "message:u1:u2");
        assert_eq!(published.header("type"), Some("text"));
        assert_eq!(published.value, data);
    }

    #[tokio::test]
    async fn test_broker_mode_surfaces_publish_errors() {
        let pool = WorkerPool::new_shared(1, 16);
        let broker = MemoryBroker::new_shared(8, pool);
        broker.close();
        let handler = ForwardHandler::broker(Arc::new(JsonEncoder), broker, "im.messages");

        let err = handler
            .handle(&encode(MessageType::Text, "u1", "u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Publish(BrokerError::Closed)));
    }
}
