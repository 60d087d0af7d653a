//! Presence observers and snapshots

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use im_core::PlatformId;
use serde::Serialize;

use crate::connection::ConnectionState;

/// Receives per-platform state transitions.
///
/// Each call runs as its own task on the worker pool, so a slow observer
/// never holds up connection admission or removal.
#[async_trait]
pub trait StateObserver: Send + Sync {
    async fn on_user_state_change(
        &self,
        user_id: &str,
        platform_id: PlatformId,
        old: ConnectionState,
        new: ConnectionState,
        at: DateTime<Utc>,
    );
}

/// Derived view of one user's platforms
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserState {
    pub id: String,
    pub online_platforms: Vec<PlatformId>,
    pub offline_platforms: Vec<PlatformId>,
}

impl UserState {
    pub fn empty(user_id: &str) -> Self {
        Self {
            id: user_id.to_string(),
            ..Self::default()
        }
    }
}
