//! Connection registry manager

use chrono::Utc;
use futures::future::join_all;
use im_common::WorkerPool;
use im_core::{Message, PlatformId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::{Platform, RegistryError, StateObserver, UserState};
use crate::connection::{ConnectionError, ConnectionState, LongConn};

/// Tracks every user's platform connections and fans messages out to them
pub struct Manager {
    users: RwLock<HashMap<String, Arc<Platform>>>,
    observers: RwLock<Vec<Arc<dyn StateObserver>>>,
    pool: Arc<WorkerPool>,
}

impl Manager {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            observers: RwLock::new(Vec::new()),
            pool,
        }
    }

    pub fn new_shared(pool: Arc<WorkerPool>) -> Arc<Self> {
        Arc::new(Self::new(pool))
    }

    /// Track `conn` as the user's connection on `platform_id`.
    ///
    /// An existing connection for the pair is replaced but not closed; the
    /// caller disconnects it. The connection's disconnect callback is taken
    /// over by the registry: it emits `Connected -> Disconnected` and removes
    /// the entry if it still holds this connection.
    pub fn add_conn(self: &Arc<Self>, user_id: &str, platform_id: PlatformId, conn: Arc<dyn LongConn>) {
        let registry = Arc::downgrade(self);
        let hook_user = user_id.to_string();
        let conn_id = conn.id().to_string();
        conn.on_disconnect(Arc::new(move |reason: Option<&ConnectionError>| {
            let Some(manager) = registry.upgrade() else {
                return;
            };
            manager.notify(
                &hook_user,
                platform_id,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
            );
            if manager.remove_conn_if(&hook_user, platform_id, &conn_id) {
                debug!(
                    user_id = %hook_user,
                    platform_id,
                    conn_id = %conn_id,
                    reason = ?reason,
                    "Connection removed after disconnect"
                );
            }
        }));

        let new_state = conn.state();
        let replaced = {
            let mut users = self.users.write();
            let platform = users
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Platform::default()));
            platform.insert(platform_id, conn)
        };
        let old_state = replaced
            .as_ref()
            .map_or(ConnectionState::Disconnected, |old| old.state());

        debug!(
            user_id,
            platform_id,
            replaced = replaced.is_some(),
            "Connection registered"
        );
        self.notify(user_id, platform_id, old_state, new_state);
    }

    /// Drop the user's entry for `platform_id`; the user goes with it when no
    /// platform is left
    pub fn remove_conn(&self, user_id: &str, platform_id: PlatformId) -> Option<Arc<dyn LongConn>> {
        self.remove_matching(user_id, platform_id, None)
    }

    /// Like [`Manager::remove_conn`] but only while the entry still holds `conn_id`
    pub fn remove_conn_if(&self, user_id: &str, platform_id: PlatformId, conn_id: &str) -> bool {
        self.remove_matching(user_id, platform_id, Some(conn_id))
            .is_some()
    }

    fn remove_matching(
        &self,
        user_id: &str,
        platform_id: PlatformId,
        conn_id: Option<&str>,
    ) -> Option<Arc<dyn LongConn>> {
        let mut users = self.users.write();
        let platform = users.get(user_id)?;
        let (removed, now_empty) = platform.remove(platform_id, conn_id);
        if now_empty {
            users.remove(user_id);
            debug!(user_id, "User has no platforms left");
        }
        removed
    }

    /// `None` when the pair is not tracked
    pub fn get_conn(&self, user_id: &str, platform_id: PlatformId) -> Option<Arc<dyn LongConn>> {
        let platform = self.users.read().get(user_id).cloned()?;
        platform.get(platform_id)
    }

    /// Snapshot of a user's platforms; empty for unknown users
    pub fn get_state(&self, user_id: &str) -> UserState {
        let platform = self.users.read().get(user_id).cloned();
        platform.map_or_else(|| UserState::empty(user_id), |p| p.state(user_id))
    }

    /// Snapshot per known user. Users removed while collecting are skipped.
    pub fn get_all(&self) -> Vec<UserState> {
        let platforms: Vec<(String, Arc<Platform>)> = self
            .users
            .read()
            .iter()
            .map(|(user, platform)| (user.clone(), Arc::clone(platform)))
            .collect();

        let mut states: Vec<UserState> = platforms
            .into_iter()
            .filter(|(_, platform)| !platform.is_empty())
            .map(|(user, platform)| platform.state(&user))
            .collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }

    /// Number of users with at least one tracked platform
    pub fn get_online_count(&self) -> usize {
        self.users.read().len()
    }

    /// Registry membership; a user whose only connection is closing still counts
    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.read().contains_key(user_id)
    }

    /// Send to every connected platform of every user
    pub async fn broadcast_message(&self, msg: &Message) -> Vec<RegistryError> {
        let targets: Vec<(String, Arc<dyn LongConn>)> = {
            let users = self.users.read();
            users
                .iter()
                .flat_map(|(user, platform)| {
                    platform
                        .connections()
                        .into_iter()
                        .map(move |conn| (user.clone(), conn))
                })
                .collect()
        };
        trace!(targets = targets.len(), msg_id = %msg.id(), "Broadcasting message");
        send_all(targets, msg).await
    }

    /// Send to every connected platform of one user. An unknown user yields no errors.
    pub async fn send_message(&self, user_id: &str, msg: &Message) -> Vec<RegistryError> {
        let Some(platform) = self.users.read().get(user_id).cloned() else {
            trace!(user_id, "Recipient not connected");
            return Vec::new();
        };
        let targets = platform
            .connections()
            .into_iter()
            .map(|conn| (user_id.to_string(), conn))
            .collect();
        send_all(targets, msg).await
    }

    /// Send to exactly one platform of a user
    pub async fn send_platform_message(
        &self,
        user_id: &str,
        platform_id: PlatformId,
        msg: &Message,
    ) -> Result<(), RegistryError> {
        let conn = self
            .get_conn(user_id, platform_id)
            .ok_or_else(|| RegistryError::NotFound {
                user_id: user_id.to_string(),
                platform_id,
            })?;

        conn.send(msg).await.map_err(|source| RegistryError::Send {
            user_id: user_id.to_string(),
            platform_id,
            source,
        })
    }

    pub fn add_observer(&self, observer: Arc<dyn StateObserver>) {
        self.observers.write().push(observer);
    }

    /// Remove by identity; returns whether it was registered
    pub fn remove_observer(&self, observer: &Arc<dyn StateObserver>) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|o| !Arc::ptr_eq(o, observer));
        observers.len() != before
    }

    fn notify(
        &self,
        user_id: &str,
        platform_id: PlatformId,
        old: ConnectionState,
        new: ConnectionState,
    ) {
        if old == new {
            return;
        }
        let observers = self.observers.read().clone();
        let at = Utc::now();

        for observer in observers {
            let user = user_id.to_string();
            let task = async move {
                observer
                    .on_user_state_change(&user, platform_id, old, new, at)
                    .await;
            };
            if let Err(e) = self.pool.submit(task) {
                warn!(user_id, platform_id, error = %e, "State change notification dropped");
            }
        }
    }
}

/// Send concurrently to every connected target, collecting one error per failure
async fn send_all(targets: Vec<(String, Arc<dyn LongConn>)>, msg: &Message) -> Vec<RegistryError> {
    let sends = targets
        .into_iter()
        .filter(|(_, conn)| conn.state().is_connected())
        .map(|(user_id, conn)| async move {
            conn.send(msg).await.map_err(|source| RegistryError::Send {
                user_id,
                platform_id: conn.platform_id(),
                source,
            })
        });

    let errors: Vec<RegistryError> = join_all(sends)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();

    for err in &errors {
        warn!(error = %err, "Delivery failed");
    }
    errors
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("users", &self.users.read().len())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}
