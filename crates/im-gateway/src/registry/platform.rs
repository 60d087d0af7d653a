//! Per-user connection set

use im_core::PlatformId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::UserState;
use crate::connection::LongConn;

/// Connections of one user, keyed by platform
#[derive(Default)]
pub struct Platform {
    conns: RwLock<HashMap<PlatformId, Arc<dyn LongConn>>>,
}

impl Platform {
    /// Returns the connection that was replaced, if any
    pub(crate) fn insert(
        &self,
        platform_id: PlatformId,
        conn: Arc<dyn LongConn>,
    ) -> Option<Arc<dyn LongConn>> {
        self.conns.write().insert(platform_id, conn)
    }

    /// Remove a platform entry, optionally only when it still holds `conn_id`.
    ///
    /// Returns the removed connection and whether the set is now empty.
    pub(crate) fn remove(
        &self,
        platform_id: PlatformId,
        conn_id: Option<&str>,
    ) -> (Option<Arc<dyn LongConn>>, bool) {
        let mut conns = self.conns.write();
        let matches = match (conns.get(&platform_id), conn_id) {
            (Some(current), Some(id)) => current.id() == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let removed = if matches {
            conns.remove(&platform_id)
        } else {
            None
        };
        (removed, conns.is_empty())
    }

    pub fn get(&self, platform_id: PlatformId) -> Option<Arc<dyn LongConn>> {
        self.conns.read().get(&platform_id).cloned()
    }

    pub fn connections(&self) -> Vec<Arc<dyn LongConn>> {
        self.conns.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.read().is_empty()
    }

    pub(crate) fn state(&self, user_id: &str) -> UserState {
        let mut state = UserState::empty(user_id);
        for (platform_id, conn) in self.conns.read().iter() {
            if conn.state().is_connected() {
                state.online_platforms.push(*platform_id);
            } else {
                state.offline_platforms.push(*platform_id);
            }
        }
        state.online_platforms.sort_unstable();
        state.offline_platforms.sort_unstable();
        state
    }
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut platforms: Vec<_> = self.conns.read().keys().copied().collect();
        platforms.sort_unstable();
        f.debug_struct("Platform")
            .field("platforms", &platforms)
            .finish()
    }
}
