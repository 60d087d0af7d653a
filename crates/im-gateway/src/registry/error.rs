//! Registry errors

use im_core::PlatformId;
use thiserror::Error;

use crate::connection::ConnectionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no connection for user {user_id} on platform {platform_id}")]
    NotFound {
        user_id: String,
        platform_id: PlatformId,
    },

    #[error("send to user {user_id} on platform {platform_id} failed: {source}")]
    Send {
        user_id: String,
        platform_id: PlatformId,
        #[source]
        source: ConnectionError,
    },
}
