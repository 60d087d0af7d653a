//! Inbound message pipeline
//!
//! Every non-heartbeat message runs through a [`Chain`] of handlers. The
//! default chain forwards first and persists second.

mod error;
mod forward;
mod handler;
mod store;

pub use error::HandlerError;
pub use forward::ForwardHandler;
pub use handler::{Chain, Handler};
pub use store::StoreHandler;

use std::sync::Arc;

/// Build the standard `[forward, store]` chain
pub fn new_message_chain(forward: ForwardHandler, store: StoreHandler) -> Chain {
    let mut chain = Chain::new();
    chain.add_handler(Arc::new(forward));
    chain.add_handler(Arc::new(store));
    chain
}
