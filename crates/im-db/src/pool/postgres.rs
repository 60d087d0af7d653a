//! PostgreSQL pool for the message store

use im_common::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Pool sizing and connection lifetimes
///
/// Built from the `database` section of the application config; the
/// timeouts are not configurable from the environment.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long an insert may wait for a free connection
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl PoolSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        let mut settings = Self::new(config.url.clone());
        settings.max_connections = config.max_connections;
        settings.min_connections = config.min_connections.min(config.max_connections);
        settings
    }
}

/// Connect the pool, failing if the first connection cannot be made
pub async fn create_pool(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .connect(&settings.url)
        .await?;

    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Message store pool ready"
    );
    Ok(pool)
}
