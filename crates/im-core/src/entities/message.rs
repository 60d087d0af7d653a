//! Application message exchanged between connected clients

use crate::value_objects::{Snowflake, SnowflakeGenerator};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform (device/client type) identifier
pub type PlatformId = i32;

/// Message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Unknown,
    Heartbeat,
    System,
    Text,
    Image,
    Video,
    Audio,
    File,
    Custom,
}

impl MessageType {
    /// Kinds that carry user content and are routed to a recipient
    #[must_use]
    pub const fn is_payload_bearing(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Image | Self::Video | Self::Audio | Self::File
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Heartbeat => "heartbeat",
            Self::System => "system",
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing metadata of a [`Message`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    #[serde(default)]
    id: Snowflake,
    #[serde(rename = "type")]
    msg_type: MessageType,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    platform: PlatformId,
}

impl MessageHeader {
    pub fn id(&self) -> Snowflake {
        self.id
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn platform(&self) -> PlatformId {
        self.platform
    }
}

/// Application message: header plus opaque payload.
///
/// There are no setters; [`Message::stamped`] consumes the message and
/// returns a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    header: MessageHeader,
    #[serde(default, with = "base64_payload")]
    payload: Vec<u8>,
}

impl Message {
    /// Build a message with a freshly generated id and the current time
    pub fn new(
        ids: &SnowflakeGenerator,
        msg_type: MessageType,
        from: impl Into<String>,
        to: impl Into<String>,
        platform: PlatformId,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            header: MessageHeader {
                id: ids.generate(),
                msg_type,
                timestamp: Utc::now(),
                from: from.into(),
                to: to.into(),
                platform,
            },
            payload: payload.into(),
        }
    }

    /// Build a message from already known parts (decoders, tests, replays)
    pub fn from_parts(
        id: Snowflake,
        msg_type: MessageType,
        timestamp: DateTime<Utc>,
        from: impl Into<String>,
        to: impl Into<String>,
        platform: PlatformId,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            header: MessageHeader {
                id,
                msg_type,
                timestamp,
                from: from.into(),
                to: to.into(),
                platform,
            },
            payload: payload.into(),
        }
    }

    pub fn heartbeat(ids: &SnowflakeGenerator, from: impl Into<String>, platform: PlatformId) -> Self {
        Self::new(ids, MessageType::Heartbeat, from, "", platform, Vec::new())
    }

    /// Rewrite sender identity with the authenticated values and assign a
    /// gateway id. Whatever id the client sent is discarded.
    pub fn stamped(
        mut self,
        ids: &SnowflakeGenerator,
        from: impl Into<String>,
        platform: PlatformId,
    ) -> Self {
        self.header.id = ids.generate();
        self.header.from = from.into();
        self.header.platform = platform;
        self
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn id(&self) -> Snowflake {
        self.header.id
    }

    pub fn msg_type(&self) -> MessageType {
        self.header.msg_type
    }

    pub fn from(&self) -> &str {
        &self.header.from
    }

    pub fn to(&self) -> &str {
        &self.header.to
    }

    pub fn platform(&self) -> PlatformId {
        self.header.platform
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.header.timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_heartbeat(&self) -> bool {
        self.header.msg_type == MessageType::Heartbeat
    }
}

mod base64_payload {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
