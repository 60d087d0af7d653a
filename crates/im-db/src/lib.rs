//! # im-db
//!
//! Implementations of the `MessageStore` port.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use im_db::{create_pool, PoolSettings, PgMessageStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&PoolSettings::new("postgres://localhost/im_db")).await?;
//!     let store = PgMessageStore::new(pool);
//!     Ok(())
//! }
//! ```

pub mod pool;
pub mod stores;

// Re-export commonly used types
pub use pool::{create_pool, PgPool, PoolSettings};
pub use stores::{InMemoryMessageStore, PgMessageStore};
