//! Connection pool management

mod postgres;

pub use postgres::{create_pool, PoolSettings};
pub use sqlx::PgPool;
