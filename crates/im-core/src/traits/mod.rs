//! Ports implemented by infrastructure crates

mod store;

pub use store::{MessageStore, RepoResult};
