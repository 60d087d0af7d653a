//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub heartbeat: HeartbeatConfig,
    pub broker: BrokerConfig,
    pub worker_pool: WorkerPoolConfig,
    pub database: Option<DatabaseConfig>,
    pub snowflake: SnowflakeConfig,
    pub codec: CodecConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(other.to_string()),
        }
    }
}

/// WebSocket listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port 0 asks the OS for an ephemeral port
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
    /// Platform assigned when the client does not send `platform_id`
    #[serde(default = "default_platform_id")]
    pub default_platform_id: i32,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl GatewayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            path: default_path(),
            default_platform_id: default_platform_id(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Liveness settings applied to every connection
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// How the forward stage hands a message to its recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    /// Write straight to the recipient's connections
    #[default]
    Direct,
    /// Publish to the broker and let a consumer deliver
    Broker,
}

impl FromStr for ForwardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "broker" => Ok(Self::Broker),
            other => Err(other.to_string()),
        }
    }
}

/// In-process broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub forward_mode: ForwardMode,
    #[serde(default = "default_forward_topic")]
    pub forward_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            capacity: default_broker_capacity(),
            forward_mode: ForwardMode::default(),
            forward_topic: default_forward_topic(),
        }
    }
}

/// Background worker pool sizing
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WorkerPoolConfig {
    #[serde(default = "default_pool_size")]
    pub size: usize,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            queue_size: default_queue_size(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Snowflake ID generator configuration
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SnowflakeConfig {
    #[serde(default)]
    pub node_id: u16,
}

/// Frame compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    None,
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "none" => Ok(Self::None),
            other => Err(other.to_string()),
        }
    }
}

/// Wire codec configuration
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CodecConfig {
    #[serde(default)]
    pub compression: Compression,
}

// Default value functions
fn default_app_name() -> String {
    "im-gateway".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_path() -> String {
    "/ws".to_string()
}

fn default_platform_id() -> i32 {
    1
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_broker_capacity() -> usize {
    1024
}

fn default_forward_topic() -> String {
    "message_forward".to_string()
}

fn default_pool_size() -> usize {
    10
}

fn default_queue_size() -> usize {
    1000
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a required variable is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let heartbeat = HeartbeatConfig {
            interval: Duration::from_secs(vars.parse_or("HEARTBEAT_INTERVAL_SECS", 30)?),
            timeout: Duration::from_secs(vars.parse_or("HEARTBEAT_TIMEOUT_SECS", 60)?),
            write_timeout: Duration::from_secs(vars.parse_or("WRITE_TIMEOUT_SECS", 10)?),
        };
        if heartbeat.interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "HEARTBEAT_INTERVAL_SECS",
                "must be greater than zero".to_string(),
            ));
        }
        if heartbeat.timeout < heartbeat.interval {
            return Err(ConfigError::InvalidValue(
                "HEARTBEAT_TIMEOUT_SECS",
                format!(
                    "{}s is shorter than the heartbeat interval ({}s)",
                    heartbeat.timeout.as_secs(),
                    heartbeat.interval.as_secs()
                ),
            ));
        }

        let node_id: u16 = vars.parse_or("NODE_ID", 0)?;
        if node_id > 1023 {
            return Err(ConfigError::InvalidValue("NODE_ID", node_id.to_string()));
        }

        let path = vars.get("GATEWAY_PATH").unwrap_or_else(default_path);
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidValue("GATEWAY_PATH", path));
        }

        Ok(Self {
            app: AppSettings {
                name: vars.get("APP_NAME").unwrap_or_else(default_app_name),
                env: vars.parse_or("APP_ENV", Environment::default())?,
            },
            gateway: GatewayConfig {
                host: vars.get("GATEWAY_HOST").unwrap_or_else(default_host),
                port: vars.parse_required("GATEWAY_PORT")?,
                path,
                default_platform_id: vars.parse_or("DEFAULT_PLATFORM_ID", default_platform_id())?,
                max_frame_bytes: vars.parse_or("MAX_FRAME_BYTES", default_max_frame_bytes())?,
            },
            heartbeat,
            broker: BrokerConfig {
                capacity: vars.parse_or("BROKER_CAPACITY", default_broker_capacity())?,
                forward_mode: vars.parse_or("FORWARD_MODE", ForwardMode::default())?,
                forward_topic: vars.get("FORWARD_TOPIC").unwrap_or_else(default_forward_topic),
            },
            worker_pool: WorkerPoolConfig {
                size: vars.parse_or("WORKER_POOL_SIZE", default_pool_size())?,
                queue_size: vars.parse_or("WORKER_QUEUE_SIZE", default_queue_size())?,
            },
            database: match vars.get("DATABASE_URL") {
                Some(url) => Some(DatabaseConfig {
                    url,
                    max_connections: vars
                        .parse_or("DATABASE_MAX_CONNECTIONS", default_max_connections())?,
                    min_connections: vars
                        .parse_or("DATABASE_MIN_CONNECTIONS", default_min_connections())?,
                }),
                None => None,
            },
            snowflake: SnowflakeConfig { node_id },
            codec: CodecConfig {
                compression: vars.parse_or("COMPRESSION", Compression::default())?,
            },
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw)),
            None => Ok(default),
        }
    }

    fn parse_required<T: FromStr>(&self, key: &'static str) -> Result<T, ConfigError> {
        let raw = self.get(key).ok_or(ConfigError::MissingVar(key))?;
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
