//! Configuration structs

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, BrokerConfig, CodecConfig, Compression, ConfigError, DatabaseConfig,
    Environment, ForwardMode, GatewayConfig, HeartbeatConfig, SnowflakeConfig, WorkerPoolConfig,
};
