//! Connection errors

use thiserror::Error;

use super::ConnectionState;
use crate::codec::CodecError;

/// Failures local to one connection. All of them end that connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection is not connected")]
    NotConnected,

    #[error("invalid state transition {from} -> {to}")]
    InvalidState {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("write failed: {0}")]
    Write(String),

    #[error("write timed out")]
    WriteTimeout,

    #[error("read failed: {0}")]
    Read(String),

    #[error("connection closed by peer")]
    Closed,

    #[error("no heartbeat for {elapsed_ms}ms")]
    HeartbeatTimeout { elapsed_ms: i64 },

    #[error("replaced by a newer connection")]
    Superseded,

    #[error("gateway shutting down")]
    Shutdown,
}

impl ConnectionError {
    pub fn is_heartbeat_timeout(&self) -> bool {
        matches!(self, Self::HeartbeatTimeout { .. })
    }

    /// Transport-level failures, as opposed to orderly closes
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Write(_) | Self::WriteTimeout | Self::Read(_) | Self::Codec(_)
        )
    }
}

pub type ConnResult<T> = Result<T, ConnectionError>;
