//! Background task execution

mod pool;

pub use pool::{PoolError, WorkerPool};
