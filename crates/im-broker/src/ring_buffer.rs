//! Fixed-capacity circular buffer
//!
//! Offsets are absolute and grow forever; the slot of an offset is
//! `offset & mask`. The buffer exposes the window `[tail, head)` and keeps one
//! slot free, so a buffer of capacity `n` holds at most `n - 1` messages.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::{BrokerError, BrokerResult};
use crate::message::BrokerMessage;

/// A message as stored in the buffer
#[derive(Debug, Clone)]
pub struct BufferedMessage {
    pub message: BrokerMessage,
    pub offset: i64,
    pub enqueued_at: DateTime<Utc>,
}

struct Inner {
    slots: Vec<Option<Arc<BufferedMessage>>>,
    head: i64,
    tail: i64,
}

pub struct RingBuffer {
    inner: RwLock<Inner>,
    mask: i64,
}

impl RingBuffer {
    /// Capacity is rounded up to the next power of two (minimum 2)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            inner: RwLock::new(Inner {
                slots: vec![None; capacity],
                head: 0,
                tail: 0,
            }),
            mask: capacity as i64 - 1,
        }
    }

    /// Append a message and return its offset
    pub fn put(&self, message: BrokerMessage) -> BrokerResult<i64> {
        let mut inner = self.inner.write();
        if inner.head - inner.tail == self.mask {
            return Err(BrokerError::BufferFull);
        }

        let offset = inner.head;
        let slot = (offset & self.mask) as usize;
        inner.slots[slot] = Some(Arc::new(BufferedMessage {
            message,
            offset,
            enqueued_at: Utc::now(),
        }));
        inner.head += 1;
        Ok(offset)
    }

    /// Read without consuming. Offsets outside `[tail, head)` yield `None`.
    pub fn get(&self, offset: i64) -> Option<Arc<BufferedMessage>> {
        let inner = self.inner.read();
        if offset < inner.tail || offset >= inner.head {
            return None;
        }
        inner.slots[(offset & self.mask) as usize].clone()
    }

    /// Remove and return the oldest message
    pub fn pop(&self) -> Option<Arc<BufferedMessage>> {
        let mut inner = self.inner.write();
        if inner.tail == inner.head {
            return None;
        }
        let slot = (inner.tail & self.mask) as usize;
        inner.tail += 1;
        inner.slots[slot].take()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        (inner.head - inner.tail) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        (self.mask + 1) as usize
    }

    /// Offset the next `put` will receive
    pub fn head(&self) -> i64 {
        self.inner.read().head
    }

    /// Oldest retained offset
    pub fn tail(&self) -> i64 {
        self.inner.read().tail
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("head", &inner.head)
            .field("tail", &inner.tail)
            .finish()
    }
}
