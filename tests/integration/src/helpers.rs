//! Test helpers for integration tests
//!
//! Provides a gateway running on an ephemeral port, WebSocket clients bound
//! to it, and polling utilities for asynchronous effects.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use futures_util::{SinkExt, StreamExt};
use im_common::AppConfig;
use im_core::{Message, MessageStore, PlatformId};
use im_db::InMemoryMessageStore;
use im_gateway::codec::Codec;
use im_gateway::Gateway;
use reqwest::Client;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// How long a test waits for an asynchronous effect
pub const WAIT: Duration = Duration::from_secs(3);

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Gateway instance that manages its own lifecycle
pub struct TestGateway {
    pub gateway: Gateway,
    pub addr: SocketAddr,
    pub store: Arc<InMemoryMessageStore>,
    pub client: Client,
    shutdown: CancellationToken,
}

impl TestGateway {
    /// Start with the default test configuration and an in-memory store
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()).await
    }

    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let store = Arc::new(InMemoryMessageStore::new());
        Self::start_with(config, Some(Arc::clone(&store) as Arc<dyn MessageStore>), store).await
    }

    /// Start without any message store
    pub async fn start_without_store() -> Result<Self> {
        Self::start_with(test_config(), None, Arc::new(InMemoryMessageStore::new())).await
    }

    async fn start_with(
        config: AppConfig,
        store: Option<Arc<dyn MessageStore>>,
        memory: Arc<InMemoryMessageStore>,
    ) -> Result<Self> {
        let gateway = Gateway::new(config, store)?;
        let shutdown = CancellationToken::new();
        let addr = gateway.start(&shutdown).await?;

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            gateway,
            addr,
            store: memory,
            client,
            shutdown,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Upgrade URL for a user, optionally naming the platform
    pub fn ws_url(&self, user_id: &str, platform_id: Option<PlatformId>) -> String {
        let path = &self.gateway.config().gateway.path;
        match platform_id {
            Some(p) => format!("ws://{}{path}?user_id={user_id}&platform_id={p}", self.addr),
            None => format!("ws://{}{path}?user_id={user_id}", self.addr),
        }
    }

    /// Connect a client and wait until the gateway has registered it
    pub async fn connect(&self, user_id: &str, platform_id: PlatformId) -> Result<WsStream> {
        let (stream, _) = connect_async(self.ws_url(user_id, Some(platform_id))).await?;
        let registered = wait_until(|| {
            self.gateway
                .manager()
                .get_state(user_id)
                .online_platforms
                .contains(&platform_id)
        })
        .await;
        if !registered {
            bail!("{user_id} on platform {platform_id} was never registered");
        }
        Ok(stream)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Cancel the parent token handed to `start`
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }
}

/// Test configuration: ephemeral port, direct forwarding, gzip frames
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.gateway.port = 0;
    config.worker_pool.size = 2;
    config.worker_pool.queue_size = 256;
    config
}

/// Poll `check` until it holds or [`WAIT`] elapses
pub async fn wait_until<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Bound any future by [`WAIT`]
pub async fn within<T>(fut: impl Future<Output = T>) -> Result<T> {
    Ok(tokio::time::timeout(WAIT, fut).await?)
}

/// Send a message the way a browser client would: uncompressed JSON text
pub async fn send_text(ws: &mut WsStream, msg: &serde_json::Value) -> Result<()> {
    ws.send(WsMessage::Text(msg.to_string())).await?;
    Ok(())
}

/// Send a message as a compressed binary frame
pub async fn send_binary(ws: &mut WsStream, msg: &Message) -> Result<()> {
    let frame = Codec::default().encode_frame(msg)?;
    ws.send(WsMessage::Binary(frame)).await?;
    Ok(())
}

/// Next application message, skipping control frames
pub async fn recv_message(ws: &mut WsStream) -> Result<Message> {
    within(next_message(ws)).await?
}

async fn next_message(ws: &mut WsStream) -> Result<Message> {
    while let Some(frame) = ws.next().await {
        match frame? {
            WsMessage::Binary(data) => return Ok(Codec::default().decode_frame(&data)?),
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            other => bail!("unexpected frame: {other:?}"),
        }
    }
    bail!("connection closed")
}

/// Wait until the server closes the socket
pub async fn expect_closed(ws: &mut WsStream) -> Result<()> {
    within(next_close(ws)).await?
}

async fn next_close(ws: &mut WsStream) -> Result<()> {
    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Close(_)) | Err(_) => return Ok(()),
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_)) => {}
            Ok(other) => bail!("unexpected frame before close: {other:?}"),
        }
    }
    Ok(())
}
