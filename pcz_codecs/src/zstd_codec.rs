use pcz_core::format::CODEC_ZSTD;
use pcz_core::Codec;

/// Zstandard codec.
///
/// Each chunk becomes one complete zstd frame at the configured level
/// (default: 3), so chunks decode independently and in any order.
///
/// Best for: logs, JSON, mixed structured data where ratio matters.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let compressed = zstd::bulk::compress(raw, self.level)?;
        Ok(compressed)
    }

    fn decompress_block(&self, compressed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        // `raw_len` caps the output buffer, so a frame that claims more
        // content than its header fails here instead of allocating freely.
        let raw = zstd::bulk::decompress(compressed, raw_len)?;
        Ok(raw)
    }
}
