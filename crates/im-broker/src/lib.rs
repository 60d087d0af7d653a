//! # im-broker
//!
//! Producer/Consumer abstraction for asynchronous message hand-off, plus an
//! in-process implementation backed by per-topic ring buffers. Wire brokers
//! implement the same traits.

mod error;
mod memory;
mod message;
mod ring_buffer;
mod traits;

pub use error::{BrokerError, BrokerResult};
pub use memory::MemoryBroker;
pub use message::BrokerMessage;
pub use ring_buffer::{BufferedMessage, RingBuffer};
pub use traits::{Consumer, MessageHandler, Producer};
