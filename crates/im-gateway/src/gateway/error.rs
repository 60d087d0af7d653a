//! Facade errors

use im_broker::BrokerError;
use im_common::AppError;
use im_core::{GeneratorError, PlatformId};
use thiserror::Error;

use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway already started")]
    AlreadyStarted,

    #[error("gateway stopped")]
    Stopped,

    #[error("no connection for user {user_id} on platform {platform_id}")]
    NotFound {
        user_id: String,
        platform_id: PlatformId,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("invalid id generator settings: {0}")]
    IdGenerator(#[from] GeneratorError),

    #[error(transparent)]
    App(#[from] AppError),
}

impl GatewayError {
    /// Absent user or platform, as opposed to a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Registry(RegistryError::NotFound { .. })
        )
    }
}
