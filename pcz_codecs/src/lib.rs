mod lz4_codec;
mod passthrough;
mod zlib_codec;
mod zstd_codec;

pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zlib_codec::ZlibCodec;
pub use zstd_codec::ZstdCodec;

use pcz_core::format::{CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_ZLIB, CODEC_ZSTD};
use pcz_core::Codec;
use std::sync::Arc;

/// Names accepted by [`codec_by_name`], in display order.
pub const CODEC_NAMES: &[&str] = &["zlib", "zstd", "lz4", "passthrough"];

/// Resolve a codec from the `codec_id` stored in a frame header.
///
/// Decoding uses the codec's default level: levels only affect compression.
pub fn codec_by_id(id: u16) -> anyhow::Result<Arc<dyn Codec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassThroughCodec)),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        CODEC_ZLIB => Ok(Arc::new(ZlibCodec::default())),
        _ => anyhow::bail!(
            "unknown codec id {}; supported: 0 (passthrough), 1 (zstd), 2 (lz4), 3 (zlib)",
            id
        ),
    }
}

/// Resolve a codec from its CLI name, with an optional compression level.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "zlib" | "deflate" => Ok(Arc::new(match level {
            Some(l) => ZlibCodec::new(u32::try_from(l).map_err(|_| {
                anyhow::anyhow!("zlib level must be between 0 and 9, got {}", l)
            })?)?,
            None => ZlibCodec::default(),
        })),
        "zstd" | "z" => Ok(Arc::new(level.map(ZstdCodec::new).unwrap_or_default())),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: {}",
            other,
            CODEC_NAMES.join(", ")
        ),
    }
}
