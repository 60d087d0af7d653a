//! IM gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p im-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use anyhow::Context;
use im_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use im_core::MessageStore;
use im_db::{create_pool, PgMessageStore, PoolSettings};
use im_gateway::Gateway;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        address = %config.gateway.address(),
        forward_mode = ?config.broker.forward_mode,
        "Configuration loaded"
    );

    let store: Option<Arc<dyn MessageStore>> = match &config.database {
        Some(db) => {
            info!("Connecting to PostgreSQL...");
            let pool = create_pool(&PoolSettings::from(db))
                .await
                .context("failed to connect to the database")?;
            info!("PostgreSQL connection established");
            Some(Arc::new(PgMessageStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set, messages will not be persisted");
            None
        }
    };

    let gateway = Gateway::new(config, store)?;
    let shutdown = CancellationToken::new();
    gateway.start(&shutdown).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    gateway.stop().await?;
    Ok(())
}
