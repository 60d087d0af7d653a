//! Transport-independent connection contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use im_core::{Message, PlatformId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{ConnResult, ConnectionError, ConnectionState};

/// Invoked for every non-heartbeat inbound message. The read loop awaits the
/// returned future, so messages of one connection are handled in order.
pub type OnMessage = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Invoked exactly once, after the connection reached `Disconnected`
pub type OnDisconnect = Arc<dyn Fn(Option<&ConnectionError>) + Send + Sync>;

/// Invoked when the read loop or heartbeat checker hits a failure
pub type OnError = Arc<dyn Fn(&ConnectionError) + Send + Sync>;

/// One long-lived client connection.
///
/// Callback slots hold a single callback each; registering again replaces the
/// previous one. Callbacks run without any connection lock held.
#[async_trait]
pub trait LongConn: Send + Sync {
    fn id(&self) -> &str;

    fn platform_id(&self) -> PlatformId;

    /// Move to `Connected` and start the read loop and heartbeat checker.
    ///
    /// Both tasks stop when the connection disconnects or `parent` is cancelled.
    /// Calling this twice is an error.
    fn connect(self: Arc<Self>, parent: &CancellationToken) -> ConnResult<()>;

    fn state(&self) -> ConnectionState;

    fn last_ping_time(&self) -> DateTime<Utc>;

    fn update_last_ping_time(&self, at: DateTime<Utc>);

    fn on_message(&self, callback: OnMessage);

    fn on_disconnect(&self, callback: OnDisconnect);

    fn on_error(&self, callback: OnError);

    /// Write one message. Fails with `NotConnected` unless the state is `Connected`.
    async fn send(&self, msg: &Message) -> ConnResult<()>;

    /// Read the next application message
    async fn receive(&self) -> ConnResult<Message>;

    /// Close the connection. Only the first call has any effect.
    async fn disconnect(&self, reason: Option<ConnectionError>);
}
