//! # im-gateway
//!
//! Persistent-connection gateway: WebSocket connections with heartbeats, a
//! per-user multi-platform registry, and the forward-then-store message chain.

pub mod chain;
pub mod codec;
pub mod connection;
pub mod gateway;
pub mod registry;
pub mod server;

pub use gateway::{Gateway, GatewayError};
