//! In-memory `LongConn` for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use im_core::{Message, PlatformId};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{
    ConnResult, ConnectionError, ConnectionState, LongConn, OnDisconnect, OnError, OnMessage,
};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

pub struct MockConn {
    id: String,
    platform_id: PlatformId,
    state: RwLock<ConnectionState>,
    last_ping: RwLock<DateTime<Utc>>,
    broken: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<Message>>,
    on_disconnect: Mutex<Option<OnDisconnect>>,
}

impl MockConn {
    /// A connection already in `Connected`
    pub fn connected(platform_id: PlatformId) -> Arc<Self> {
        let conn = Self::idle(platform_id);
        *conn.state.write() = ConnectionState::Connected;
        conn
    }

    pub fn idle(platform_id: PlatformId) -> Arc<Self> {
        Arc::new(Self {
            id: format!("mock-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            platform_id,
            state: RwLock::new(ConnectionState::Connecting),
            last_ping: RwLock::new(Utc::now()),
            broken: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            on_disconnect: Mutex::new(None),
        })
    }

    /// Transport gone while the state still says `Connected`
    pub fn break_transport(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl LongConn for MockConn {
    fn id(&self) -> &str {
        &self.id
    }

    fn platform_id(&self) -> PlatformId {
        self.platform_id
    }

    fn connect(self: Arc<Self>, _parent: &CancellationToken) -> ConnResult<()> {
        *self.state.write() = ConnectionState::Connected;
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

    fn on_message(&self, _callback: OnMessage) {}

    fn on_disconnect(&self, callback: OnDisconnect) {
        *self.on_disconnect.lock() = Some(callback);
    }

    fn on_error(&self, _callback: OnError) {}

    async fn send(&self, msg: &Message) -> ConnResult<()> {
        if !self.state().is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(ConnectionError::Write("broken pipe".to_string()));
        }
        self.sent.lock().push(msg.clone());
        Ok(())
    }

    async fn receive(&self) -> ConnResult<Message> {
        std::future::pending().await
    }

    async fn disconnect(&self, reason: Option<ConnectionError>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.state.write() = ConnectionState::Disconnected;
        let callback = self.on_disconnect.lock().clone();
        if let Some(callback) = callback {
            callback(reason.as_ref());
        }
    }
}
