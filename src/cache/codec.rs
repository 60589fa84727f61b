//! Codec Module
//!
//! Converts values to their stored byte representation and back. Values are
//! encoded as JSON; payloads above the configured threshold are LZ4-compressed
//! when that actually makes them smaller.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Payload ==
/// A value in its stored form.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Bytes as stored (compressed when `compressed` is set)
    pub bytes: Vec<u8>,
    pub compressed: bool,
    /// Size of the serialized form before compression
    pub original_size: u64,
}

impl Payload {
    /// Ratio of serialized size to stored size (1.0 when uncompressed).
    pub fn compression_ratio(&self) -> f64 {
        if !self.compressed || self.bytes.is_empty() {
            1.0
        } else {
            self.original_size as f64 / self.bytes.len() as f64
        }
    }
}

// == Serialize ==
/// Encodes a value as JSON bytes.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

// == Deserialize ==
/// Decodes JSON bytes back into a value.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Corrupt(e.to_string()))
}

// == Compress ==
/// LZ4 block compression with the uncompressed length prepended.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::compress(data, None, true).map_err(|e| CacheError::Compression(e.to_string()))
}

// == Decompress ==
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    lz4::block::decompress(data, None).map_err(|e| CacheError::Corrupt(e.to_string()))
}

// == Calculate Size ==
/// Byte size of the representation that will actually be stored.
pub fn calculate_size(bytes: &[u8]) -> u64 {
    bytes.len() as u64
}

// == Encode ==
/// Serializes `value` and compresses it when the config asks for it.
///
/// Compression is only attempted above `compression_threshold`, and its
/// output is kept only when strictly smaller than the serialized form.
pub fn encode<T: Serialize + ?Sized>(value: &T, config: &CacheConfig) -> Result<Payload> {
    let serialized = serialize(value)?;
    let original_size = calculate_size(&serialized);

    if config.enable_compression && original_size > config.compression_threshold {
        let compressed = compress(&serialized)?;
        if calculate_size(&compressed) < original_size {
            return Ok(Payload {
                bytes: compressed,
                compressed: true,
                original_size,
            });
        }
    }

    Ok(Payload {
        bytes: serialized,
        compressed: false,
        original_size,
    })
}

// == Decode ==
/// Reverses `encode`, returning the original logical value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], compressed: bool) -> Result<T> {
    if compressed {
        deserialize(&decompress(bytes)?)
    } else {
        deserialize(bytes)
    }
}
