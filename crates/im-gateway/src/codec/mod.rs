//! Wire codec
//!
//! Outbound frames are `encode` then `compress`; inbound binary frames are
//! `decompress` then `decode`. Both halves are pluggable.

mod compressor;
mod encoder;
mod error;

pub use compressor::{compressor_for, Compressor, GzipCompressor, NoopCompressor};
pub use encoder::{Encoder, JsonEncoder};
pub use error::CodecError;

use im_core::Message;
use std::sync::Arc;

/// Encoder + compressor pair used to build and read binary frames
#[derive(Clone)]
pub struct Codec {
    encoder: Arc<dyn Encoder>,
    compressor: Arc<dyn Compressor>,
}

impl Codec {
    pub fn new(encoder: Arc<dyn Encoder>, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            encoder,
            compressor,
        }
    }

    /// Message to compressed frame bytes
    pub fn encode_frame(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        self.compressor.compress(&self.encoder.encode(msg)?)
    }

    /// Compressed frame bytes to message
    pub fn decode_frame(&self, data: &[u8]) -> Result<Message, CodecError> {
        self.encoder.decode(&self.compressor.decompress(data)?)
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Arc::new(JsonEncoder), Arc::new(GzipCompressor::default()))
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}
