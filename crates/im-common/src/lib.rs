//! # im-common
//!
//! Shared utilities: configuration, error handling, telemetry and the
//! bounded background worker pool.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod worker;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, BrokerConfig, CodecConfig, Compression, ConfigError, DatabaseConfig,
    Environment, ForwardMode, GatewayConfig, HeartbeatConfig, SnowflakeConfig, WorkerPoolConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
pub use worker::{PoolError, WorkerPool};
