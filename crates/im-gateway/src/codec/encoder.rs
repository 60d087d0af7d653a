//! Message encoders

use im_core::Message;

use super::CodecError;

/// Turns messages into bytes and back
pub trait Encoder: Send + Sync {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, data: &[u8]) -> Result<Message, CodecError>;
}

/// JSON encoding with a base64 payload
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<Message, CodecError> {
        serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
