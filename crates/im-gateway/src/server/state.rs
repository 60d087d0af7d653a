//! Shared handler state

use im_common::AppConfig;
use im_core::SnowflakeGenerator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::chain::Chain;
use crate::codec::Codec;
use crate::registry::Manager;

/// Everything an admitted connection needs, cheap to clone per request
#[derive(Clone)]
pub struct GatewayState {
    manager: Arc<Manager>,
    chain: Arc<Chain>,
    codec: Codec,
    ids: Arc<SnowflakeGenerator>,
    config: Arc<AppConfig>,
    /// Parent of every connection's lifetime
    shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(
        manager: Arc<Manager>,
        chain: Arc<Chain>,
        codec: Codec,
        ids: Arc<SnowflakeGenerator>,
        config: Arc<AppConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            chain,
            codec,
            ids,
            config,
            shutdown,
        }
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn ids(&self) -> &SnowflakeGenerator {
        &self.ids
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("manager", &self.manager)
            .field("chain", &self.chain)
            .field("config", &"AppConfig")
            .finish()
    }
}
