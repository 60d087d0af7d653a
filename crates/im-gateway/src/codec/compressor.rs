//! Frame compressors

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use im_common::Compression;
use std::io::{Read, Write};
use std::sync::Arc;

use super::CodecError;

pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Gzip with a cap on the decompressed size
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: flate2::Compression,
    max_output: usize,
}

impl GzipCompressor {
    pub fn new(max_output: usize) -> Self {
        Self {
            level: flate2::Compression::default(),
            max_output,
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let limit = self.max_output as u64;
        let mut out = Vec::new();
        GzDecoder::new(data)
            .take(limit + 1)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;

        if out.len() as u64 > limit {
            return Err(CodecError::Decompress(format!(
                "frame exceeds {} bytes once decompressed",
                self.max_output
            )));
        }
        Ok(out)
    }
}

/// Pass-through
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(data.to_vec())
    }
}

/// Build the compressor selected in configuration
pub fn compressor_for(compression: Compression, max_output: usize) -> Arc<dyn Compressor> {
    match compression {
        Compression::Gzip => Arc::new(GzipCompressor::new(max_output)),
        Compression::None => Arc::new(NoopCompressor),
    }
}
