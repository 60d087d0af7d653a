//! Connection registry
//!
//! Two lock levels: the registry lock guards `user_id -> Platform`, each
//! [`Platform`] lock guards `platform_id -> connection`. Always registry
//! first, never the reverse, and never across network I/O.

mod error;
mod manager;
mod observer;
mod platform;

pub use error::RegistryError;
pub use manager::Manager;
pub use observer::{StateObserver, UserState};
pub use platform::Platform;
