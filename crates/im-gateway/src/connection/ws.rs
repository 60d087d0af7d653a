//! WebSocket connection
//!
//! Generic over the sink/stream halves so the same code runs on an axum
//! socket in production and on in-memory channels in tests.

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use chrono::{DateTime, Utc};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use im_common::HeartbeatConfig;
use im_core::{Message, PlatformId};
use parking_lot::{Mutex, RwLock};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{
    ConnResult, ConnectionError, ConnectionState, LongConn, OnDisconnect, OnError, OnMessage,
};
use crate::codec::Codec;

/// Connection over an upgraded axum socket
pub type AxumWsConnection = WsConnection<SplitSink<WebSocket, WsMessage>, SplitStream<WebSocket>>;

/// One persistent client connection
pub struct WsConnection<Tx, Rx> {
    /// Random id, used by the registry to tell replacements apart
    id: String,
    /// Platform the client connected from
    platform_id: PlatformId,
    /// Lifecycle state
    state: RwLock<ConnectionState>,
    /// Last heartbeat seen. Own lock so liveness checks never queue behind a slow write
    last_ping: RwLock<DateTime<Utc>>,
    /// Write half; one writer at a time
    sink: AsyncMutex<Tx>,
    /// Read half, owned by the read loop once connected
    stream: AsyncMutex<Rx>,
    /// Frame encoding and compression
    codec: Codec,
    /// Ping interval, liveness timeout and write deadline
    heartbeat: HeartbeatConfig,
    /// Cancelled on disconnect; stops both background tasks
    done: CancellationToken,
    /// Set by the first `disconnect`
    closed: AtomicBool,
    /// Called for every non-heartbeat message
    on_message: Mutex<Option<OnMessage>>,
    /// Called once after the connection is fully closed
    on_disconnect: Mutex<Option<OnDisconnect>>,
    /// Called on read and heartbeat failures before disconnecting
    on_error: Mutex<Option<OnError>>,
}

impl AxumWsConnection {
    /// Wrap a freshly upgraded socket
    pub fn from_socket(
        socket: WebSocket,
        platform_id: PlatformId,
        codec: Codec,
        heartbeat: HeartbeatConfig,
    ) -> Arc<Self> {
        let (sink, stream) = socket.split();
        Arc::new(Self::new(sink, stream, platform_id, codec, heartbeat))
    }
}

impl<Tx, Rx> WsConnection<Tx, Rx>
where
    Tx: Sink<WsMessage> + Unpin + Send + 'static,
    Tx::Error: Display + Send,
    Rx: Stream<Item = Result<WsMessage, axum::Error>> + Unpin + Send + 'static,
{
    /// New connections start in `Connecting`
    pub fn new(
        sink: Tx,
        stream: Rx,
        platform_id: PlatformId,
        codec: Codec,
        heartbeat: HeartbeatConfig,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform_id,
            state: RwLock::new(ConnectionState::Connecting),
            last_ping: RwLock::new(Utc::now()),
            sink: AsyncMutex::new(sink),
            stream: AsyncMutex::new(stream),
            codec,
            heartbeat,
            done: CancellationToken::new(),
            closed: AtomicBool::new(false),
            on_message: Mutex::new(None),
            on_disconnect: Mutex::new(None),
            on_error: Mutex::new(None),
        }
    }

    fn transition(&self, next: ConnectionState) -> ConnResult<()> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(ConnectionError::InvalidState {
                from: *state,
                to: next,
            });
        }
        trace!(conn_id = %self.id, from = %*state, to = %next, "Connection state changed");
        *state = next;
        Ok(())
    }

    fn emit_error(&self, err: &ConnectionError) {
        let callback = self.on_error.lock().clone();
        if let Some(callback) = callback {
            callback(err);
        }
    }

    /// Write one frame under the sink lock, bounded by the write timeout
    async fn write_frame(&self, frame: WsMessage) -> ConnResult<()> {
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(frame).await
        };
        match timeout(self.heartbeat.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Write(e.to_string())),
            Err(_) => Err(ConnectionError::WriteTimeout),
        }
    }

    async fn read_loop(self: Arc<Self>, parent: CancellationToken) {
        let reason = loop {
            let next = tokio::select! {
                () = self.done.cancelled() => break None,
                () = parent.cancelled() => break Some(ConnectionError::Shutdown),
                next = self.receive() => next,
            };

            match next {
                Ok(msg) if msg.is_heartbeat() => {
                    self.update_last_ping_time(Utc::now());
                    trace!(conn_id = %self.id, "Heartbeat received");
                }
                Ok(msg) => {
                    let callback = self.on_message.lock().clone();
                    match callback {
                        Some(callback) => callback(msg).await,
                        None => debug!(conn_id = %self.id, "No message callback; frame dropped"),
                    }
                }
                Err(ConnectionError::Closed) => break Some(ConnectionError::Closed),
                Err(e) => {
                    debug!(conn_id = %self.id, error = %e, "Read loop failed");
                    self.emit_error(&e);
                    break Some(e);
                }
            }
        };

        self.disconnect(reason).await;
    }

    async fn heartbeat_loop(self: Arc<Self>, parent: CancellationToken) {
        let period = self.heartbeat.interval;
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                () = self.done.cancelled() => return,
                // The read loop turns shutdown into a disconnect
                () = parent.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let elapsed = Utc::now() - self.last_ping_time();
            if elapsed.to_std().unwrap_or_default() > self.heartbeat.timeout {
                warn!(
                    conn_id = %self.id,
                    elapsed_ms = elapsed.num_milliseconds(),
                    "Heartbeat timeout"
                );
                let err = ConnectionError::HeartbeatTimeout {
                    elapsed_ms: elapsed.num_milliseconds(),
                };
                self.emit_error(&err);
                self.disconnect(Some(err)).await;
                return;
            }

            if let Err(e) = self.write_frame(WsMessage::Ping(Vec::new())).await {
                warn!(conn_id = %self.id, error = %e, "Ping failed");
                self.emit_error(&e);
                self.disconnect(Some(e)).await;
                return;
            }
        }
    }
}

#[async_trait]
impl<Tx, Rx> LongConn for WsConnection<Tx, Rx>
where
    Tx: Sink<WsMessage> + Unpin + Send + 'static,
    Tx::Error: Display + Send,
    Rx: Stream<Item = Result<WsMessage, axum::Error>> + Unpin + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn platform_id(&self) -> PlatformId {
        self.platform_id
    }

    fn connect(self: Arc<Self>, parent: &CancellationToken) -> ConnResult<()> {
        self.transition(ConnectionState::Connected)?;
        self.update_last_ping_time(Utc::now());

        tokio::spawn(Arc::clone(&self).read_loop(parent.clone()));
        tokio::spawn(Arc::clone(&self).heartbeat_loop(parent.clone()));

        debug!(conn_id = %self.id, platform_id = self.platform_id, "Connection started");
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn last_ping_time(&self) -> DateTime<Utc> {
        *self.last_ping.read()
    }

    fn update_last_ping_time(&self, at: DateTime<Utc>) {
        *self.last_ping.write() = at;
    }

    fn on_message(&self, callback: OnMessage) {
        *self.on_message.lock() = Some(callback);
    }

    fn on_disconnect(&self, callback: OnDisconnect) {
        *self.on_disconnect.lock() = Some(callback);
    }

    fn on_error(&self, callback: OnError) {
        *self.on_error.lock() = Some(callback);
    }

    async fn send(&self, msg: &Message) -> ConnResult<()> {
        if !self.state().is_connected() {
            return Err(ConnectionError::NotConnected);
        }

        let frame = self.codec.encode_frame(msg)?;
        if let Err(e) = self.write_frame(WsMessage::Binary(frame)).await {
            warn!(conn_id = %self.id, error = %e, "Send failed, closing connection");
            self.disconnect(Some(e.clone())).await;
            return Err(e);
        }

        trace!(conn_id = %self.id, msg_id = %msg.id(), "Message sent");
        Ok(())
    }

    async fn receive(&self) -> ConnResult<Message> {
        let mut stream = self.stream.lock().await;
        loop {
            let frame = stream
                .next()
                .await
                .ok_or(ConnectionError::Closed)?
                .map_err(|e| ConnectionError::Read(e.to_string()))?;

            match frame {
                WsMessage::Binary(data) => return Ok(self.codec.decode_frame(&data)?),
                WsMessage::Text(text) => {
                    return Ok(self.codec.encoder().decode(text.as_bytes())?);
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                WsMessage::Close(_) => return Err(ConnectionError::Closed),
            }
        }
    }

    async fn disconnect(&self, reason: Option<ConnectionError>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // A connection that never started has nothing to close gracefully
        let _ = self.transition(ConnectionState::Closing);
        self.done.cancel();

        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match timeout(self.heartbeat.write_timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(conn_id = %self.id, error = %e, "Close frame not delivered"),
            Err(_) => debug!(conn_id = %self.id, "Close timed out"),
        }

        *self.state.write() = ConnectionState::Disconnected;

        match &reason {
            Some(e) if e.is_transport() || e.is_heartbeat_timeout() => {
                warn!(conn_id = %self.id, reason = %e, "Connection closed");
            }
            Some(e) => info!(conn_id = %self.id, reason = %e, "Connection closed"),
            None => info!(conn_id = %self.id, "Connection closed"),
        }

        let callback = self.on_disconnect.lock().clone();
        if let Some(callback) = callback {
            callback(reason.as_ref());
        }
    }
}

impl<Tx, Rx> std::fmt::Debug for WsConnection<Tx, Rx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("platform_id", &self.platform_id)
            .field("state", &*self.state.read())
            .finish()
    }
}
