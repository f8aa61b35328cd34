use super::Compressor;
use crate::error::Result;
use std::io::{Read, Write, copy};

/// Uncompressed payloads; level is ignored.
pub struct Store;

impl Compressor for Store {
    fn compress(&self, src: &mut dyn Read, dst: &mut dyn Write, _level: i32) -> Result<u64> {
        let n = copy(src, dst)?;
        Ok(n)
    }

    fn decompress(&self, src: &mut dyn Read, dst: &mut dyn Write) -> Result<u64> {
        // Stored bytes are the plain bytes.
        self.compress(src, dst, 0)
    }
}
