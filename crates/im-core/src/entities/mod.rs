//! Domain entities

mod message;
mod record;

pub use message::{Message, MessageHeader, MessageType, PlatformId};
pub use record::{MessageRecord, MessageStatus};
