//! `MessageStore` implementations

mod error;
mod memory;
mod message;

pub use memory::InMemoryMessageStore;
pub use message::PgMessageStore;
