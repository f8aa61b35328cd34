use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecId {
    Store = 0,
    Zstd = 1,
}

pub trait Compressor: Send + Sync {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, level: i32) -> Result<u64>;
    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64>;
}

pub mod store;
pub mod zstdc;

/// Minimum fraction zstd must save before a payload is stored compressed.
pub const MIN_GAIN: f32 = 0.05;

pub fn compressor_for(id: CodecId) -> &'static dyn Compressor {
    match id {
        CodecId::Store => &store::Store,
        CodecId::Zstd => &zstdc::ZstdCompressor,
    }
}

fn should_compress(u: usize, c: usize, min_gain: f32) -> bool {
    // true if (u - c) >= u * min_gain  ⇔  c <= u * (1 - min_gain)
    (u as f64 - c as f64) >= (u as f64 * min_gain as f64)
}

/// Encode a payload for storage. Level 0 always stores; otherwise zstd is
/// kept only when it saves at least [`MIN_GAIN`].
pub fn encode_payload(plain: &[u8], level: u32) -> Result<(CodecId, Vec<u8>)> {
    if level == 0 || plain.is_empty() {
        return Ok((CodecId::Store, plain.to_vec()));
    }
    let mut packed = Vec::with_capacity(plain.len() / 2);
    zstdc::ZstdCompressor.compress(&mut &plain[..], &mut packed, level as i32)?;
    if should_compress(plain.len(), packed.len(), MIN_GAIN) {
        Ok((CodecId::Zstd, packed))
    } else {
        Ok((CodecId::Store, plain.to_vec()))
    }
}

/// Decode a stored payload into `dst`, returning the number of plain bytes written.
pub fn decode_payload(codec: CodecId, stored: &[u8], dst: &mut dyn Write) -> Result<u64> {
    compressor_for(codec).decompress(&mut &stored[..], dst)
}
