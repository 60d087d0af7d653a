//! In-process broker
//!
//! Each topic owns a ring buffer. Published messages are delivered to push
//! subscribers by drain tasks on the shared worker pool, or taken by `poll`.
//! Subscribers and pollers of one topic compete for messages.

use async_trait::async_trait;
use dashmap::DashMap;
use im_common::WorkerPool;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, trace, warn};

use crate::error::{BrokerError, BrokerResult};
use crate::message::BrokerMessage;
use crate::ring_buffer::{BufferedMessage, RingBuffer};
use crate::traits::{Consumer, MessageHandler, Producer};

struct Topic {
    name: String,
    buffer: RingBuffer,
    notify: Notify,
    handlers: RwLock<Vec<Arc<dyn MessageHandler>>>,
    /// Serializes drains so subscribers see offset order
    drain_lock: Mutex<()>,
}

impl Topic {
    fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            buffer: RingBuffer::new(capacity),
            notify: Notify::new(),
            handlers: RwLock::new(Vec::new()),
            drain_lock: Mutex::new(()),
        }
    }

    fn has_handlers(&self) -> bool {
        !self.handlers.read().is_empty()
    }

    async fn drain(&self) {
        let _guard = self.drain_lock.lock().await;

        loop {
            let handlers = self.handlers.read().clone();
            if handlers.is_empty() {
                break;
            }
            let Some(item) = self.buffer.pop() else { break };

            for handler in &handlers {
                if let Err(e) = handler.handle(&item.message).await {
                    warn!(
                        topic = %self.name,
                        offset = item.offset,
                        error = %e,
                        "Subscriber failed to handle message"
                    );
                }
            }
            trace!(topic = %self.name, offset = item.offset, "Message delivered to subscribers");
        }
    }
}

/// Ring-buffer backed [`Producer`] + [`Consumer`]
pub struct MemoryBroker {
    topics: DashMap<String, Arc<Topic>>,
    capacity: usize,
    pool: Arc<WorkerPool>,
    closed: AtomicBool,
}

impl MemoryBroker {
    /// `capacity` applies to every topic buffer
    pub fn new(capacity: usize, pool: Arc<WorkerPool>) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
            pool,
            closed: AtomicBool::new(false),
        }
    }

    pub fn new_shared(capacity: usize, pool: Arc<WorkerPool>) -> Arc<Self> {
        Arc::new(Self::new(capacity, pool))
    }

    /// Number of retained, undelivered messages in a topic
    pub fn pending(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |t| t.buffer.len())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reject further publishes and wake every waiting poller
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for topic in &self.topics {
            topic.notify.notify_waiters();
        }
        debug!(topics = self.topics.len(), "Memory broker closed");
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        if let Some(topic) = self.topics.get(name) {
            return Arc::clone(topic.value());
        }
        Arc::clone(
            self.topics
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Topic::new(name, self.capacity)))
                .value(),
        )
    }

    fn schedule_drain(&self, topic: &Arc<Topic>) {
        let task_topic = Arc::clone(topic);
        if let Err(e) = self.pool.submit(async move { task_topic.drain().await }) {
            // The message stays buffered and goes out with the next drain.
            warn!(topic = %topic.name, error = %e, "Could not schedule topic drain");
        }
    }

    fn ensure_open(&self) -> BrokerResult<()> {
        if self.is_closed() {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Producer for MemoryBroker {
    async fn publish(&self, msg: BrokerMessage) -> BrokerResult<()> {
        self.ensure_open()?;
        if msg.topic.is_empty() {
            return Err(BrokerError::TopicEmpty);
        }

        let topic = self.topic(&msg.topic);
        let offset = topic.buffer.put(msg)?;
        trace!(topic = %topic.name, offset, "Message published");

        topic.notify.notify_waiters();
        if topic.has_handlers() {
            self.schedule_drain(&topic);
        }
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        MemoryBroker::close(self);
        Ok(())
    }
}

#[async_trait]
impl Consumer for MemoryBroker {
    async fn subscribe(&self, topic: &str, handler: Arc<dyn MessageHandler>) -> BrokerResult<()> {
        self.ensure_open()?;
        if topic.is_empty() {
            return Err(BrokerError::TopicEmpty);
        }

        let topic = self.topic(topic);
        topic.handlers.write().push(handler);
        debug!(topic = %topic.name, "Subscriber registered");

        // Deliver anything published before the first subscriber arrived
        if !topic.buffer.is_empty() {
            self.schedule_drain(&topic);
        }
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> BrokerResult<()> {
        let entry = self
            .topics
            .get(topic)
            .ok_or_else(|| BrokerError::NotFound(topic.to_string()))?;
        entry.handlers.write().clear();
        debug!(topic, "Subscribers removed");
        Ok(())
    }

    async fn poll(&self, topic: &str) -> BrokerResult<BrokerMessage> {
        if topic.is_empty() {
            return Err(BrokerError::TopicEmpty);
        }
        let topic = self.topic(topic);

        loop {
            // Register interest before checking, so a publish in between is not missed
            let notified = topic.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.ensure_open()?;
            if let Some(item) = topic.buffer.pop() {
                return Ok(into_message(item));
            }
            notified.await;
        }
    }

    async fn close(&self) -> BrokerResult<()> {
        MemoryBroker::close(self);
        Ok(())
    }
}

fn into_message(item: Arc<BufferedMessage>) -> BrokerMessage {
    Arc::try_unwrap(item).map_or_else(|shared| shared.message.clone(), |owned| owned.message)
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}
