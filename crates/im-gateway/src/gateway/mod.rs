//! Gateway facade
//!
//! Owns the worker pool, registry, broker and message chain, runs the
//! WebSocket listener and exposes the send and presence operations used by
//! the rest of the system.

mod delivery;
mod error;

pub use delivery::DeliveryHandler;
pub use error::GatewayError;

use chrono::{DateTime, Utc};
use im_broker::{Consumer, MemoryBroker, Producer};
use im_common::{AppConfig, AppError, ForwardMode, WorkerPool};
use im_core::{Message, MessageStore, PlatformId, SnowflakeGenerator};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::chain::{new_message_chain, Chain, ForwardHandler, StoreHandler};
use crate::codec::{compressor_for, Codec, JsonEncoder};
use crate::registry::{Manager, RegistryError};
use crate::server::{create_app, GatewayState};

pub struct Gateway {
    config: Arc<AppConfig>,
    pool: Arc<WorkerPool>,
    manager: Arc<Manager>,
    broker: Arc<MemoryBroker>,
    chain: Arc<Chain>,
    codec: Codec,
    ids: Arc<SnowflakeGenerator>,
    root: CancellationToken,
    started: AtomicBool,
    stopped: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Wire up every component. Must be called inside a tokio runtime.
    ///
    /// Without a store the chain's store stage rejects every message.
    pub fn new(
        config: AppConfig,
        store: Option<Arc<dyn MessageStore>>,
    ) -> Result<Self, GatewayError> {
        let ids = Arc::new(SnowflakeGenerator::new(config.snowflake.node_id)?);
        let pool = WorkerPool::new_shared(config.worker_pool.size, config.worker_pool.queue_size);
        let manager = Manager::new_shared(Arc::clone(&pool));
        let broker = MemoryBroker::new_shared(config.broker.capacity, Arc::clone(&pool));

        let codec = Codec::new(
            Arc::new(JsonEncoder),
            compressor_for(config.codec.compression, config.gateway.max_frame_bytes),
        );
        let encoder = Arc::clone(codec.encoder());

        let forward = match config.broker.forward_mode {
            ForwardMode::Direct => ForwardHandler::direct(Arc::clone(&encoder), Arc::clone(&manager)),
            ForwardMode::Broker => {
                let producer: Arc<dyn Producer> = broker.clone();
                ForwardHandler::broker(
                    Arc::clone(&encoder),
                    producer,
                    config.broker.forward_topic.clone(),
                )
            }
        };
        let chain = Arc::new(new_message_chain(forward, StoreHandler::new(encoder, store)));

        debug!(
            forward_mode = ?config.broker.forward_mode,
            compression = ?config.codec.compression,
            chain = ?chain,
            "Gateway assembled"
        );

        Ok(Self {
            config: Arc::new(config),
            pool,
            manager,
            broker,
            chain,
            codec,
            ids,
            root: CancellationToken::new(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            local_addr: Mutex::new(None),
            server: Mutex::new(None),
        })
    }

    /// Bind the listener and serve until `parent` is cancelled or [`Gateway::stop`] runs.
    ///
    /// Returns the bound address, which matters when the configured port is 0.
    #[instrument(skip_all)]
    pub async fn start(&self, parent: &CancellationToken) -> Result<SocketAddr, GatewayError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(GatewayError::Stopped);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyStarted);
        }

        if self.config.broker.forward_mode == ForwardMode::Broker {
            let delivery = DeliveryHandler::new(Arc::clone(self.codec.encoder()), Arc::clone(&self.manager));
            self.broker
                .subscribe(&self.config.broker.forward_topic, Arc::new(delivery))
                .await?;
        }

        let addr = self.config.gateway.address();
        let listener = TcpListener::bind(addr.as_str())
            .await
            .map_err(|e| AppError::Server(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Server(format!("no local address: {e}")))?;
        *self.local_addr.lock() = Some(local_addr);

        // A cancelled parent brings the whole gateway down
        let root = self.root.clone();
        let parent = parent.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = parent.cancelled() => root.cancel(),
                () = root.cancelled() => {}
            }
        });

        let state = GatewayState::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.chain),
            self.codec.clone(),
            Arc::clone(&self.ids),
            Arc::clone(&self.config),
            self.root.clone(),
        );
        let app = create_app(state, &self.config.gateway.path);

        let shutdown = self.root.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Gateway server failed");
            }
        });
        *self.server.lock() = Some(server);

        info!(
            address = %local_addr,
            path = %self.config.gateway.path,
            "Gateway listening"
        );
        Ok(local_addr)
    }

    /// Shut everything down. Only the first call does anything.
    pub async fn stop(&self) -> Result<(), GatewayError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.root.cancel();

        let server = self.server.lock().take();
        if let Some(server) = server {
            if let Err(e) = server.await {
                error!(error = %e, "Gateway server task ended abnormally");
            }
        }

        self.broker.close();
        self.pool.shutdown();
        info!(online = self.manager.get_online_count(), "Gateway stopped");
        Ok(())
    }

    /// Send to every connected platform of every user
    pub async fn broadcast(&self, msg: &Message) -> Vec<RegistryError> {
        self.manager.broadcast_message(msg).await
    }

    pub async fn send_to_all_platforms(&self, user_id: &str, msg: &Message) -> Vec<RegistryError> {
        self.manager.send_message(user_id, msg).await
    }

    pub async fn send_to_platform(
        &self,
        user_id: &str,
        platform_id: PlatformId,
        msg: &Message,
    ) -> Result<(), GatewayError> {
        Ok(self
            .manager
            .send_platform_message(user_id, platform_id, msg)
            .await?)
    }

    pub fn get_online_count(&self) -> usize {
        self.manager.get_online_count()
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.manager.is_online(user_id)
    }

    /// Last heartbeat seen on one platform connection
    pub fn get_user_heartbeat_status(
        &self,
        user_id: &str,
        platform_id: PlatformId,
    ) -> Result<DateTime<Utc>, GatewayError> {
        self.manager
            .get_conn(user_id, platform_id)
            .map(|conn| conn.last_ping_time())
            .ok_or_else(|| GatewayError::NotFound {
                user_id: user_id.to_string(),
                platform_id,
            })
    }

    /// Registry, for observers and presence queries
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }

    /// Id source for server-originated messages
    pub fn ids(&self) -> &SnowflakeGenerator {
        &self.ids
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("local_addr", &self.local_addr())
            .field("manager", &self.manager)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}
