//! HTTP server
//!
//! One WebSocket admission route plus a health check.

mod handler;
mod state;

pub use handler::{gateway_handler, ConnectParams};
pub use state::GatewayState;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Routes without state or middleware
pub fn create_router(path: &str) -> Router<GatewayState> {
    Router::new()
        .route(path, get(gateway_handler))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "OK"
}

/// Complete application
pub fn create_app(state: GatewayState, path: &str) -> Router {
    create_router(path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
