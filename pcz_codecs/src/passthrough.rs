use pcz_core::format::CODEC_PASSTHROUGH;
use pcz_core::Codec;

/// No-op codec: frames chunks verbatim, with no compression.
///
/// Useful for:
/// - Exercising the chunk pipeline independently of any codec.
/// - Data that is already compressed (JPEG, MP4, archives) where further
///   compression would only expand it.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
