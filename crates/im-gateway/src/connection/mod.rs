//! Connection layer
//!
//! [`LongConn`] is the transport-independent contract; [`WsConnection`] is
//! the WebSocket implementation.

mod error;
mod long_conn;
mod state;
mod ws;

pub use error::{ConnResult, ConnectionError};
pub use long_conn::{LongConn, OnDisconnect, OnError, OnMessage};
pub use state::ConnectionState;
pub use ws::{AxumWsConnection, WsConnection};

#[cfg(test)]
pub(crate) mod mock;
