//! Codec errors

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("compress failed: {0}")]
    Compress(String),

    #[error("decompress failed: {0}")]
    Decompress(String),
}
