//! Chain handler errors

use im_broker::BrokerError;
use im_core::DomainError;
use thiserror::Error;

use crate::codec::CodecError;
use crate::registry::RegistryError;

/// A failure that stops the chain for one message
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("decode failed: {0}")]
    Decode(#[from] CodecError),

    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    #[error("delivery to {to} failed on {} connection(s)", .errors.len())]
    Delivery {
        to: String,
        errors: Vec<RegistryError>,
    },

    #[error("publish failed: {0}")]
    Publish(#[from] BrokerError),

    #[error("store failed: {0}")]
    Store(#[from] DomainError),
}

impl HandlerError {
    /// Stable code for log fields
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DECODE",
            Self::NotInitialized(_) => "NOT_INITIALIZED",
            Self::Delivery { .. } => "DELIVERY",
            Self::Publish(_) => "PUBLISH",
            Self::Store(_) => "STORE",
        }
    }
}
