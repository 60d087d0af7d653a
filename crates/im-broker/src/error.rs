//! Broker errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Ring buffer has no free slot; the caller retries or drops
    #[error("buffer full")]
    BufferFull,

    #[error("topic not found: {0}")]
    NotFound(String),

    #[error("topic cannot be empty")]
    TopicEmpty,

    #[error("broker closed")]
    Closed,

    #[error("handler failed: {0}")]
    Handler(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
