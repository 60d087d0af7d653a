//! Persistence-layer view of a message

use super::message::{Message, MessageType, PlatformId};
use crate::value_objects::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery status of a stored message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Unknown,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Stable numeric code used by the storage schema
    pub const fn code(self) -> i16 {
        match self {
            Self::Unknown => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
            Self::Failed => 4,
        }
    }
}

/// Row handed to a [`MessageStore`](crate::traits::MessageStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Snowflake,
    pub msg_type: MessageType,
    pub content: String,
    pub from_id: String,
    pub to_id: String,
    pub status: MessageStatus,
    pub platform: PlatformId,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageRecord {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id(),
            msg_type: msg.msg_type(),
            content: String::from_utf8_lossy(msg.payload()).into_owned(),
            from_id: msg.from().to_string(),
            to_id: msg.to().to_string(),
            status: MessageStatus::Sent,
            platform: msg.platform(),
            created_at: msg.timestamp(),
        }
    }
}
