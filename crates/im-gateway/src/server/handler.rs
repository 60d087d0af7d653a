//! WebSocket admission
//!
//! Validates the query, upgrades, and hands the socket to a connection that
//! feeds the message chain.

use axum::{
    extract::{ws::WebSocket, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use im_common::{AppError, ErrorResponse};
use im_core::{Message, PlatformId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::connection::{AxumWsConnection, ConnectionError, LongConn};
use crate::server::GatewayState;

/// Query string of the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub user_id: Option<String>,
    pub platform_id: Option<String>,
}

impl ConnectParams {
    /// Resolve the connecting identity, falling back to `default_platform` when
    /// no platform is given
    pub fn resolve(&self, default_platform: PlatformId) -> Result<(String, PlatformId), AppError> {
        let user_id = self
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::invalid_input("user_id is required"))?;

        let platform_id = match self.platform_id.as_deref() {
            None | Some("") => default_platform,
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::invalid_input(format!("platform_id must be an integer, got {raw:?}")))?,
        };

        Ok((user_id.to_string(), platform_id))
    }
}

/// JSON error body for rejected requests
struct Rejection(AppError);

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

/// Upgrade handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let (user_id, platform_id) = match params.resolve(state.config().gateway.default_platform_id) {
        Ok(identity) => identity,
        Err(e) => {
            debug!(error = %e, "Upgrade rejected");
            return Rejection(e).into_response();
        }
    };

    ws.max_message_size(state.config().gateway.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(state, socket, user_id, platform_id))
        .into_response()
}

async fn handle_socket(
    state: GatewayState,
    socket: WebSocket,
    user_id: String,
    platform_id: PlatformId,
) {
    let conn = AxumWsConnection::from_socket(
        socket,
        platform_id,
        state.codec().clone(),
        state.config().heartbeat,
    );
    let conn_id = conn.id().to_string();

    if let Some(old) = state.manager().get_conn(&user_id, platform_id) {
        debug!(user_id = %user_id, platform_id, old_conn_id = %old.id(), "Replacing connection");
        old.disconnect(Some(ConnectionError::Superseded)).await;
    }

    let dispatch_state = state.clone();
    let sender = user_id.clone();
    conn.on_message(Arc::new(move |msg: Message| {
        let state = dispatch_state.clone();
        let sender = sender.clone();
        async move { dispatch(&state, &sender, platform_id, msg).await }.boxed()
    }));

    let error_user = user_id.clone();
    let error_conn = conn_id.clone();
    conn.on_error(Arc::new(move |err: &ConnectionError| {
        if err.is_heartbeat_timeout() {
            info!(user_id = %error_user, conn_id = %error_conn, error = %err, "Heartbeat timeout");
        } else {
            warn!(user_id = %error_user, conn_id = %error_conn, error = %err, "Connection error");
        }
    }));

    if let Err(e) = Arc::clone(&conn).connect(state.shutdown()) {
        warn!(user_id = %user_id, conn_id = %conn_id, error = %e, "Connection failed to start");
        return;
    }

    state
        .manager()
        .add_conn(&user_id, platform_id, Arc::clone(&conn) as Arc<dyn LongConn>);

    // Closed before the registry hook was attached
    if !conn.state().is_connected() {
        state.manager().remove_conn_if(&user_id, platform_id, &conn_id);
        return;
    }

    info!(user_id = %user_id, platform_id, conn_id = %conn_id, "Client connected");
}

/// Stamp the sender identity and run the chain
async fn dispatch(state: &GatewayState, user_id: &str, platform_id: PlatformId, msg: Message) {
    let msg = msg.stamped(state.ids(), user_id, platform_id);
    trace!(user_id, msg_id = %msg.id(), kind = %msg.msg_type(), "Inbound message");

    let data = match state.codec().encoder().encode(&msg) {
        Ok(data) => data,
        Err(e) => {
            warn!(user_id, msg_id = %msg.id(), error = %e, "Could not re-encode inbound message");
            return;
        }
    };

    if let Err(e) = state.chain().process(&data).await {
        error!(
            user_id,
            platform_id,
            msg_id = %msg.id(),
            to = %msg.to(),
            code = e.code(),
            error = %e,
            "Message dropped"
        );
    }
}
