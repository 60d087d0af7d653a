//! # im-core
//!
//! Domain layer: the message model, snowflake ids and the storage port.
//! No transport or database dependencies.

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

pub use entities::{Message, MessageHeader, MessageRecord, MessageStatus, MessageType, PlatformId};
pub use error::DomainError;
pub use traits::{MessageStore, RepoResult};
pub use value_objects::{GeneratorError, Snowflake, SnowflakeGenerator, SnowflakeParseError};
