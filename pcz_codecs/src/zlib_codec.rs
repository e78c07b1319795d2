use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pcz_core::format::CODEC_ZLIB;
use pcz_core::Codec;

/// zlib (deflate + adler32) codec; the default.
///
/// Each chunk is a complete zlib stream, header and trailing checksum
/// included, so a damaged chunk is caught by zlib itself as well as by the
/// frame checksum.
pub struct ZlibCodec {
    level: Compression,
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl ZlibCodec {
    /// `level` runs from 0 (store) to 9 (smallest).
    pub fn new(level: u32) -> anyhow::Result<Self> {
        if level > 9 {
            anyhow::bail!("zlib level must be between 0 and 9, got {}", level);
        }
        Ok(Self {
            level: Compression::new(level),
        })
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Codec for ZlibCodec {
    fn id(&self) -> u16 {
        CODEC_ZLIB
    }

    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2 + 64), self.level);
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(raw_len);
        // One byte past the expected length is enough to detect an
        // oversized stream without inflating all of it.
        ZlibDecoder::new(compressed)
            .take(raw_len as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| anyhow::anyhow!("zlib decompress error: {}", e))?;
        Ok(raw)
    }
}
