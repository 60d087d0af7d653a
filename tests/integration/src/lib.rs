//! Integration test utilities for the gateway
//!
//! Starts a real gateway on an ephemeral port and drives it with WebSocket
//! clients.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
